//! Improvement projects and their artifacts.
//!
//! [`ProjectStore`] owns the collection and persists it under
//! `lss_projects`; everything else here is plain data and pure functions.

mod metrics;
mod model;
mod state;
mod store;

pub use metrics::{calculate_metrics, recent_artifacts, ProjectMetrics};
pub use model::{
    parse_datetime, Artifact, ArtifactPatch, ArtifactStatus, NewArtifact, NewProject, Project,
    ProjectPatch, ProjectStatus, RecentArtifact, DEFAULT_PHASE,
};
pub use state::{reduce, ProjectAction, ProjectState};
pub use store::ProjectStore;
