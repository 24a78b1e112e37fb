#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::float_cmp)]

//! # Tollgate
//!
//! Local project store and phase-gated workflow engine for Lean Six Sigma
//! improvement work.
//!
//! Tollgate keeps a collection of improvement projects with their artifacts
//! and walks the active project through a DMAIC or Kaizen methodology. A
//! phase is only left once its tollgate review is approved and its required
//! artifacts are completed, as far as the workflow settings ask for either.
//!
//! ## Features
//!
//! - **Projects**: Create, update and filter projects, attach artifacts
//! - **Metrics**: Active and completed counts, savings, cycle time
//! - **Workflows**: DMAIC and Kaizen phases with artifact vocabularies
//! - **Tollgates**: Approve or reject a phase review, gate advancement on it
//! - **Local persistence**: Plain JSON documents in a data directory
//!
//! ## Quick Start
//!
//! ```bash
//! tollgate project create "Reduce scrap on line 4"
//! tollgate workflow set dmaic
//! tollgate artifact add project_charter --status completed
//! tollgate workflow status
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod app;
pub mod core;
pub mod project;
pub mod session;
pub mod workflow;

// Re-export commonly used types
pub use app::App;
pub use core::{Config, FileStore, KeyValueStore, MemoryStore, StoreError};
pub use project::{Artifact, ArtifactStatus, Project, ProjectStatus, ProjectStore};
pub use session::{SessionStore, WizardSession};
pub use workflow::{TollgateDecision, WorkflowSettings, WorkflowStore, WorkflowType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "tollgate";
