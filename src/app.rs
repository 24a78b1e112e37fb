//! Application composition root.
//!
//! The `App` owns one storage handle and both stores on top of it, plus the
//! wizard session repository. Command-line runs are short-lived, so the App
//! also carries the ephemeral part of the workflow state and the project
//! selection from one run to the next.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{
    load_json, save_json, Clock, Config, FileStore, KeyValueStore, MemoryStore, StorageResult,
    SystemClock, WORKFLOW_SESSION_KEY,
};
use crate::project::{Artifact, Project, ProjectPatch, ProjectStore};
use crate::session::SessionStore;
use crate::workflow::{PhaseDefinition, WorkflowSession, WorkflowStore};

/// What survives between two runs besides the persisted collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AppSession {
    #[serde(flatten)]
    workflow: WorkflowSession,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_project_id: Option<String>,
}

/// Main application state.
#[derive(Debug)]
pub struct App {
    /// Loaded configuration
    pub config: Config,

    /// Project collection and selection
    pub projects: ProjectStore,

    /// Methodology, phase and tollgates
    pub workflow: WorkflowStore,

    /// Saved wizard sessions
    pub sessions: SessionStore,

    storage: Arc<dyn KeyValueStore>,
}

impl App {
    /// Open the stores in the configured data directory.
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let dir = config.data_dir()?;
        tracing::debug!(dir = %dir.display(), "opening data directory");
        let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir));
        Ok(Self::with_storage(config.clone(), storage, Arc::new(SystemClock)))
    }

    /// Open the stores on a fresh in-memory store with default config.
    pub fn in_memory() -> Self {
        Self::with_storage(Config::default(), Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Open the stores on `storage`, loading projects, settings and the
    /// carried-over session.
    pub fn with_storage(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let projects = ProjectStore::open(Arc::clone(&storage), Arc::clone(&clock));
        let workflow =
            WorkflowStore::open(Arc::clone(&storage), Arc::clone(&clock), config.workflow);
        let sessions = SessionStore::new(Arc::clone(&storage), clock);

        let mut app = Self { config, projects, workflow, sessions, storage };
        app.restore_session();
        app
    }

    fn restore_session(&mut self) {
        let session = match load_json::<AppSession>(self.storage.as_ref(), WORKFLOW_SESSION_KEY) {
            Ok(Some(session)) => session,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored workflow session");
                return;
            }
        };

        self.workflow.restore_session(session.workflow);
        if let Some(id) = session.current_project_id {
            match self.projects.project(&id).cloned() {
                Some(project) => self.projects.set_current_project(Some(project)),
                None => tracing::debug!(id = %id, "selected project no longer exists"),
            }
        }
    }

    /// Write the workflow session and project selection for the next run.
    pub fn save_session(&self) -> StorageResult<()> {
        let session = AppSession {
            workflow: self.workflow.snapshot_session(),
            current_project_id: self.projects.current_project().map(|p| p.id.clone()),
        };
        save_json(self.storage.as_ref(), WORKFLOW_SESSION_KEY, &session)
    }

    /// Select a project by id.
    pub fn select_project(&mut self, id: &str) -> Option<Project> {
        self.projects.select_project(id)
    }

    /// Artifacts of the selected project.
    pub fn current_artifacts(&self) -> &[Artifact] {
        self.projects.current_project().map(|p| p.artifacts.as_slice()).unwrap_or_default()
    }

    /// Select a methodology by key and tag the selected project with it.
    pub fn set_workflow(&mut self, workflow: &str) -> bool {
        if !self.workflow.set_workflow(workflow) {
            return false;
        }
        let patch = ProjectPatch {
            workflow_type: self.workflow.current_workflow().map(Some),
            current_phase: self.workflow.current_phase().map(str::to_string),
            ..ProjectPatch::default()
        };
        self.update_selected(patch);
        true
    }

    /// Jump to a phase; the selected project's phase follows.
    pub fn set_phase(&mut self, phase: &str) -> bool {
        if !self.workflow.set_phase(phase) {
            return false;
        }
        self.update_selected(ProjectPatch {
            current_phase: Some(phase.to_string()),
            ..ProjectPatch::default()
        });
        true
    }

    /// Advance the workflow using the selected project's artifacts.
    ///
    /// On success the selected project's phase follows the workflow.
    pub fn advance_phase(&mut self) -> Option<&'static PhaseDefinition> {
        let artifacts = self.current_artifacts().to_vec();
        let next = self.workflow.advance_to_next_phase(&artifacts)?;
        self.update_selected(ProjectPatch {
            current_phase: Some(next.id.to_string()),
            ..ProjectPatch::default()
        });
        Some(next)
    }

    fn update_selected(&mut self, patch: ProjectPatch) {
        if let Some(id) = self.projects.current_project().map(|p| p.id.clone()) {
            self.projects.update_project(&id, patch);
        }
    }

    /// First error recorded by either store.
    pub fn error(&self) -> Option<&str> {
        self.projects.error().or_else(|| self.workflow.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use crate::project::{ArtifactStatus, NewArtifact, NewProject};
    use crate::workflow::{WorkflowSettingsPatch, WorkflowType};
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0).unwrap()))
    }

    fn app_on(storage: &Arc<MemoryStore>) -> App {
        App::with_storage(Config::default(), storage.clone(), clock())
    }

    #[test]
    fn test_session_survives_reopen() {
        let storage = Arc::new(MemoryStore::new());
        let mut app = app_on(&storage);
        let project = app.projects.create_project(NewProject::named("Scrap")).unwrap();
        app.workflow.set_workflow("kaizen");
        app.workflow.approve_tollgate("before", "champion", "");
        app.save_session().unwrap();

        let reopened = app_on(&storage);
        assert_eq!(reopened.workflow.current_workflow(), Some(WorkflowType::Kaizen));
        assert_eq!(reopened.workflow.current_phase(), Some("before"));
        assert!(reopened.workflow.tollgate_approvals()["before"].is_approved());
        assert_eq!(reopened.projects.current_project().map(|p| &p.id), Some(&project.id));
    }

    #[test]
    fn test_missing_selected_project_is_dropped() {
        let storage = Arc::new(MemoryStore::new());
        let mut app = app_on(&storage);
        let project = app.projects.create_project(NewProject::named("Scrap")).unwrap();
        app.save_session().unwrap();
        app.projects.delete_project(&project.id);

        let reopened = app_on(&storage);
        assert!(reopened.projects.current_project().is_none());
        assert!(reopened.error().is_none());
    }

    #[test]
    fn test_advance_moves_selected_project() {
        let storage = Arc::new(MemoryStore::new());
        let mut app = app_on(&storage);
        let project = app.projects.create_project(NewProject::named("Scrap")).unwrap();
        assert!(app.set_workflow("dmaic"));
        assert_eq!(
            app.projects.project(&project.id).unwrap().workflow_type,
            Some(WorkflowType::Dmaic)
        );

        assert!(app.advance_phase().is_none());
        assert_eq!(app.error(), Some("Cannot advance to next phase. Requirements not met."));

        for ty in ["project_charter", "sipoc", "voice_of_customer"] {
            app.projects.add_artifact(NewArtifact::new(ty, ArtifactStatus::Completed));
        }
        assert_eq!(app.advance_phase().map(|p| p.id), Some("measure"));
        assert_eq!(app.projects.project(&project.id).unwrap().current_phase, "measure");
    }

    #[test]
    fn test_config_defaults_apply_until_settings_saved() {
        let storage = Arc::new(MemoryStore::new());
        let mut config = Config::default();
        config.workflow.require_tollgate_approval = true;

        let mut app = App::with_storage(config.clone(), storage.clone(), clock());
        assert!(app.workflow.workflow_settings().require_tollgate_approval);

        app.workflow.update_workflow_settings(WorkflowSettingsPatch {
            require_tollgate_approval: Some(false),
            ..WorkflowSettingsPatch::default()
        });
        let reopened = App::with_storage(config, storage, clock());
        assert!(!reopened.workflow.workflow_settings().require_tollgate_approval);
    }

    #[test]
    fn test_set_phase_moves_selected_project() {
        let mut app = App::in_memory();
        let project = app.projects.create_project(NewProject::named("Scrap")).unwrap();
        app.set_workflow("kaizen");

        assert!(app.set_phase("after"));
        assert_eq!(app.projects.project(&project.id).unwrap().current_phase, "after");

        assert!(!app.set_phase("define"));
        assert_eq!(app.error(), Some("Invalid phase"));
        assert_eq!(app.projects.project(&project.id).unwrap().current_phase, "after");
    }

    #[test]
    fn test_select_unknown_project() {
        let mut app = App::in_memory();
        assert!(app.select_project("nope").is_none());
        assert_eq!(app.error(), Some("Project not found"));
    }
}
