//! Methodology workflow: phases, tollgates and gating.
//!
//! ## Methodologies
//!
//! - `dmaic` - Define, Measure, Analyze, Improve, Control
//! - `kaizen` - Before, During, After
//!
//! ## Gating
//!
//! Leaving a phase can require an approved tollgate review
//! (`require_tollgate_approval`) and a completed artifact for every required
//! artifact type (`mandatory_artifacts`). Artifacts are passed in by the
//! caller through [`PhaseArtifact`].

mod gating;
mod phases;
mod state;
mod stats;
mod store;

pub use gating::{
    gates_pass, missing_artifacts, phase_progress, required_artifacts_complete, PhaseArtifact,
};
pub use phases::{phases_for, PhaseDefinition, WorkflowType, DMAIC_PHASES, KAIZEN_PHASES};
pub use state::{
    reduce, TollgateDecision, WorkflowAction, WorkflowSession, WorkflowSettings,
    WorkflowSettingsPatch, WorkflowState,
};
pub use stats::{approval_rate, workflow_stats, PhaseCount, WorkflowStats};
pub use store::WorkflowStore;
