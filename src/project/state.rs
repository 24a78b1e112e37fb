//! Project store state and its transition function.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::metrics::ProjectMetrics;
use super::model::{Artifact, Project};

/// Snapshot of the project store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectState {
    /// All projects, in creation order
    pub projects: Vec<Project>,
    /// Selected project
    pub current_project: Option<Project>,
    /// Whether a load is in flight
    pub loading: bool,
    /// Last error message
    pub error: Option<String>,
    /// Aggregates over `projects`
    pub metrics: ProjectMetrics,
}

/// Transitions of the project store.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectAction {
    SetLoading(bool),
    SetError(String),
    ClearError,
    LoadProjects(Vec<Project>),
    CreateProject(Project),
    UpdateProject(Project),
    DeleteProject(String),
    SetCurrentProject(Option<Project>),
    UpdateMetrics(ProjectMetrics),
    AddArtifact(Artifact),
    UpdateArtifact(Artifact),
    DeleteArtifact { id: String, at: DateTime<Utc> },
}

impl ProjectAction {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetLoading(_) => "set_loading",
            Self::SetError(_) => "set_error",
            Self::ClearError => "clear_error",
            Self::LoadProjects(_) => "load_projects",
            Self::CreateProject(_) => "create_project",
            Self::UpdateProject(_) => "update_project",
            Self::DeleteProject(_) => "delete_project",
            Self::SetCurrentProject(_) => "set_current_project",
            Self::UpdateMetrics(_) => "update_metrics",
            Self::AddArtifact(_) => "add_artifact",
            Self::UpdateArtifact(_) => "update_artifact",
            Self::DeleteArtifact { .. } => "delete_artifact",
        }
    }

    /// Whether the action can change the project collection.
    pub fn touches_projects(&self) -> bool {
        matches!(
            self,
            Self::LoadProjects(_)
                | Self::CreateProject(_)
                | Self::UpdateProject(_)
                | Self::DeleteProject(_)
                | Self::AddArtifact(_)
                | Self::UpdateArtifact(_)
                | Self::DeleteArtifact { .. }
        )
    }
}

/// Apply `action` to `state`, producing the next state.
pub fn reduce(state: &ProjectState, action: ProjectAction) -> ProjectState {
    match action {
        ProjectAction::SetLoading(loading) => ProjectState { loading, ..state.clone() },
        ProjectAction::SetError(message) => {
            ProjectState { error: Some(message), loading: false, ..state.clone() }
        }
        ProjectAction::ClearError => ProjectState { error: None, ..state.clone() },
        ProjectAction::LoadProjects(projects) => {
            ProjectState { projects, loading: false, error: None, ..state.clone() }
        }
        ProjectAction::CreateProject(project) => {
            let mut projects = state.projects.clone();
            projects.push(project.clone());
            ProjectState { projects, current_project: Some(project), ..state.clone() }
        }
        ProjectAction::UpdateProject(project) => {
            let projects = replace_project(&state.projects, &project);
            let current_project = match &state.current_project {
                Some(current) if current.id == project.id => Some(project),
                other => other.clone(),
            };
            ProjectState { projects, current_project, ..state.clone() }
        }
        ProjectAction::DeleteProject(id) => {
            let projects = state.projects.iter().filter(|p| p.id != id).cloned().collect();
            let current_project = state.current_project.clone().filter(|p| p.id != id);
            ProjectState { projects, current_project, ..state.clone() }
        }
        ProjectAction::SetCurrentProject(project) => {
            ProjectState { current_project: project, ..state.clone() }
        }
        ProjectAction::UpdateMetrics(metrics) => ProjectState { metrics, ..state.clone() },
        ProjectAction::AddArtifact(artifact) => {
            with_current_artifacts(state, artifact.updated_at, |artifacts| {
                artifacts.push(artifact);
            })
        }
        ProjectAction::UpdateArtifact(artifact) => {
            with_current_artifacts(state, artifact.updated_at, |artifacts| {
                if let Some(slot) = artifacts.iter_mut().find(|a| a.id == artifact.id) {
                    *slot = artifact;
                }
            })
        }
        ProjectAction::DeleteArtifact { id, at } => {
            with_current_artifacts(state, at, |artifacts| artifacts.retain(|a| a.id != id))
        }
    }
}

fn replace_project(projects: &[Project], updated: &Project) -> Vec<Project> {
    projects
        .iter()
        .map(|p| if p.id == updated.id { updated.clone() } else { p.clone() })
        .collect()
}

/// Edit the current project's artifacts and write the result back into both
/// `current_project` and the collection. No-op without a current project.
fn with_current_artifacts<F>(state: &ProjectState, at: DateTime<Utc>, edit: F) -> ProjectState
where
    F: FnOnce(&mut Vec<Artifact>),
{
    let Some(current) = &state.current_project else {
        return state.clone();
    };

    let mut project = current.clone();
    edit(&mut project.artifacts);
    project.updated_at = at;

    ProjectState {
        projects: replace_project(&state.projects, &project),
        current_project: Some(project),
        ..state.clone()
    }
}
