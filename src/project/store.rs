//! The project store.
//!
//! Owns the project collection, applies actions through [`reduce`], persists
//! the collection after every change and keeps the metrics current.

use std::sync::Arc;

use crate::core::{
    generate_id, load_json, save_json, Clock, KeyValueStore, StoreError, SubscriptionId,
    Subscribers, Timestamps, PROJECTS_KEY,
};

use super::metrics::{calculate_metrics, recent_artifacts, ProjectMetrics};
use super::model::{
    Artifact, ArtifactPatch, NewArtifact, NewProject, Project, ProjectPatch, ProjectStatus,
    RecentArtifact,
};
use super::state::{reduce, ProjectAction, ProjectState};

const LOAD_FAILED: &str = "Failed to load projects";
const SAVE_FAILED: &str = "Failed to save projects";

/// Project store.
///
/// Actions never return errors: failures are recorded in the state's
/// `error` field and the action returns `None` / `false`.
#[derive(Debug)]
pub struct ProjectStore {
    state: Arc<ProjectState>,
    storage: Arc<dyn KeyValueStore>,
    stamps: Timestamps,
    subscribers: Subscribers<ProjectState>,
}

impl ProjectStore {
    /// Create an empty store. Nothing is read until [`Self::load_projects`].
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(ProjectState::default()),
            storage,
            stamps: Timestamps::new(clock),
            subscribers: Subscribers::new(),
        }
    }

    /// Create a store and load the persisted collection.
    pub fn open(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self::new(storage, clock);
        store.load_projects();
        store
    }

    // --- State access ---

    /// Current state snapshot.
    pub fn snapshot(&self) -> Arc<ProjectState> {
        Arc::clone(&self.state)
    }

    /// All projects.
    pub fn projects(&self) -> &[Project] {
        &self.state.projects
    }

    /// Selected project.
    pub fn current_project(&self) -> Option<&Project> {
        self.state.current_project.as_ref()
    }

    /// Whether a load is in flight.
    pub fn loading(&self) -> bool {
        self.state.loading
    }

    /// Last error message.
    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    /// Aggregate metrics.
    pub fn metrics(&self) -> &ProjectMetrics {
        &self.state.metrics
    }

    /// Find a project by id.
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.state.projects.iter().find(|p| p.id == id)
    }

    /// Register a listener called with every new state.
    pub fn subscribe(&mut self, listener: impl Fn(&ProjectState) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    /// Remove a listener.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    // --- Actions ---

    /// Replace the collection with the persisted one.
    ///
    /// A missing document yields an empty collection. A read or parse
    /// failure records an error and keeps the current collection.
    pub fn load_projects(&mut self) {
        self.dispatch(ProjectAction::SetLoading(true));

        match load_json::<Vec<Project>>(self.storage.as_ref(), PROJECTS_KEY) {
            Ok(projects) => {
                let projects = projects.unwrap_or_default();
                for project in &projects {
                    self.stamps.observe(project.updated_at);
                    for artifact in &project.artifacts {
                        self.stamps.observe(artifact.updated_at);
                    }
                }
                tracing::debug!(count = projects.len(), "loaded projects");
                self.dispatch(ProjectAction::LoadProjects(projects));
            }
            Err(e) => self.fail(StoreError::storage(LOAD_FAILED, e)),
        }
    }

    /// Create a project, append it and select it.
    pub fn create_project(&mut self, data: NewProject) -> Option<Project> {
        if data.name.trim().is_empty() {
            self.fail(StoreError::Required("Project name"));
            return None;
        }
        if let Some(field) = data.non_finite_field() {
            self.fail(StoreError::NotFinite(field));
            return None;
        }

        let now = self.stamps.next();
        let project = Project::create(generate_id(), data, now);
        tracing::info!(id = %project.id, name = %project.name, "created project");
        self.dispatch(ProjectAction::CreateProject(project.clone()));
        Some(project)
    }

    /// Merge `patch` over the project with `id`.
    pub fn update_project(&mut self, id: &str, patch: ProjectPatch) -> Option<Project> {
        match self.try_update_project(id, patch) {
            Ok(project) => Some(project),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn try_update_project(&mut self, id: &str, patch: ProjectPatch) -> Result<Project, StoreError> {
        let mut project = self.project(id).cloned().ok_or(StoreError::NotFound("Project"))?;
        if let Some(field) = patch.non_finite_field() {
            return Err(StoreError::NotFinite(field));
        }
        patch.apply(&mut project);
        project.updated_at = self.stamps.next();
        self.dispatch(ProjectAction::UpdateProject(project.clone()));
        Ok(project)
    }

    /// Remove the project with `id`.
    pub fn delete_project(&mut self, id: &str) -> bool {
        if self.project(id).is_none() {
            self.fail(StoreError::NotFound("Project"));
            return false;
        }
        tracing::info!(id, "deleted project");
        self.dispatch(ProjectAction::DeleteProject(id.to_string()));
        true
    }

    /// Select a project (or clear the selection). No validation.
    pub fn set_current_project(&mut self, project: Option<Project>) {
        self.dispatch(ProjectAction::SetCurrentProject(project));
    }

    /// Select the project with `id`.
    pub fn select_project(&mut self, id: &str) -> Option<Project> {
        let Some(project) = self.project(id).cloned() else {
            self.fail(StoreError::NotFound("Project"));
            return None;
        };
        self.dispatch(ProjectAction::SetCurrentProject(Some(project.clone())));
        Some(project)
    }

    /// Clear the recorded error.
    pub fn clear_error(&mut self) {
        self.dispatch(ProjectAction::ClearError);
    }

    /// Append an artifact to the current project.
    ///
    /// Returns `None` without recording an error when no project is selected.
    pub fn add_artifact(&mut self, data: NewArtifact) -> Option<Artifact> {
        self.state.current_project.as_ref()?;

        let now = self.stamps.next();
        let artifact = Artifact::create(generate_id(), data, now);
        self.dispatch(ProjectAction::AddArtifact(artifact.clone()));
        Some(artifact)
    }

    /// Merge `patch` over an artifact of the current project.
    pub fn update_artifact(&mut self, id: &str, patch: ArtifactPatch) -> Option<Artifact> {
        match self.try_update_artifact(id, patch) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn try_update_artifact(
        &mut self,
        id: &str,
        patch: ArtifactPatch,
    ) -> Result<Artifact, StoreError> {
        let mut artifact = self
            .current_project()
            .and_then(|p| p.artifact(id))
            .cloned()
            .ok_or(StoreError::NotFound("Artifact"))?;
        patch.apply(&mut artifact);
        artifact.updated_at = self.stamps.next();
        self.dispatch(ProjectAction::UpdateArtifact(artifact.clone()));
        Ok(artifact)
    }

    /// Remove an artifact from the current project.
    ///
    /// Returns false without recording an error when no project is selected.
    pub fn delete_artifact(&mut self, id: &str) -> bool {
        let Some(current) = self.current_project() else {
            return false;
        };
        if current.artifact(id).is_none() {
            self.fail(StoreError::NotFound("Artifact"));
            return false;
        }

        let at = self.stamps.next();
        self.dispatch(ProjectAction::DeleteArtifact { id: id.to_string(), at });
        true
    }

    // --- Queries ---

    /// Projects with the given status.
    pub fn projects_by_status(&self, status: &ProjectStatus) -> Vec<&Project> {
        self.state.projects.iter().filter(|p| &p.status == status).collect()
    }

    /// Projects in the given phase.
    pub fn projects_by_phase(&self, phase: &str) -> Vec<&Project> {
        self.state.projects.iter().filter(|p| p.current_phase == phase).collect()
    }

    /// Most recently updated artifacts across all projects.
    pub fn recent_artifacts(&self, limit: usize) -> Vec<RecentArtifact> {
        recent_artifacts(&self.state.projects, limit)
    }

    // --- Internals ---

    fn dispatch(&mut self, action: ProjectAction) {
        tracing::debug!(action = action.name(), "project action");
        let persist = action.touches_projects() && !matches!(action, ProjectAction::LoadProjects(_));
        let touches = action.touches_projects();

        let next = reduce(&self.state, action);
        if next == *self.state {
            return;
        }
        self.state = Arc::new(next);
        self.subscribers.notify(&self.state);

        if persist {
            self.persist();
        }
        if touches {
            let metrics = calculate_metrics(&self.state.projects);
            if metrics != self.state.metrics {
                self.dispatch(ProjectAction::UpdateMetrics(metrics));
            }
        }
    }

    fn persist(&mut self) {
        let result = save_json(self.storage.as_ref(), PROJECTS_KEY, &self.state.projects);
        match result {
            Ok(()) => tracing::debug!(count = self.state.projects.len(), "saved projects"),
            Err(e) => self.fail(StoreError::storage(SAVE_FAILED, e)),
        }
    }

    fn fail(&mut self, error: StoreError) {
        match std::error::Error::source(&error) {
            Some(source) => tracing::warn!(%error, %source, "project action failed"),
            None => tracing::warn!(%error, "project action failed"),
        }
        self.dispatch(ProjectAction::SetError(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FixedClock, MemoryStore, StorageError, StorageResult};
    use crate::project::model::ArtifactStatus;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()))
    }

    fn store() -> (ProjectStore, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        (ProjectStore::open(storage.clone(), clock()), storage)
    }

    #[test]
    fn test_create_project_defaults_and_unique_ids() {
        let (mut store, _) = store();
        let a = store.create_project(NewProject::named("Scrap")).unwrap();
        let b = store.create_project(NewProject::named("Scrap")).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(a.status, ProjectStatus::Active);
        assert_eq!(a.savings, 0.0);
        assert!(a.artifacts.is_empty());
        assert_eq!(store.current_project().map(|p| p.id.as_str()), Some(b.id.as_str()));
        assert_eq!(store.metrics().active_projects, 2);
    }

    #[test]
    fn test_create_project_requires_name() {
        let (mut store, _) = store();
        assert!(store.create_project(NewProject::named("  ")).is_none());
        assert_eq!(store.error(), Some("Project name is required"));
        assert!(store.projects().is_empty());
    }

    #[test]
    fn test_update_project_merges_and_bumps_timestamp() {
        let (mut store, _) = store();
        let created = store.create_project(NewProject::named("Scrap")).unwrap();

        let patch = ProjectPatch { savings: Some(1200.0), ..ProjectPatch::default() };
        let updated = store.update_project(&created.id, patch).unwrap();

        assert_eq!(updated.savings, 1200.0);
        assert_eq!(updated.name, "Scrap");
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(store.project(&created.id), Some(&updated));
        assert_eq!(store.current_project(), Some(&updated));
        assert_eq!(store.metrics().total_savings, 1200.0);
    }

    #[test]
    fn test_update_missing_project() {
        let (mut store, _) = store();
        store.create_project(NewProject::named("Scrap"));
        let before = store.snapshot();

        assert!(store.update_project("nope", ProjectPatch::default()).is_none());
        assert_eq!(store.error(), Some("Project not found"));
        assert_eq!(store.projects(), before.projects.as_slice());
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let (mut store, storage) = store();
        let created = store.create_project(NewProject::named("Scrap")).unwrap();

        let patch = ProjectPatch { savings: Some(f64::INFINITY), ..ProjectPatch::default() };
        assert!(store.update_project(&created.id, patch).is_none());
        assert_eq!(store.error(), Some("Savings must be a finite number"));
        assert_eq!(store.project(&created.id), Some(&created));

        let data = NewProject { progress: Some(f64::NAN), ..NewProject::named("Bad") };
        assert!(store.create_project(data).is_none());
        assert_eq!(store.error(), Some("Progress must be a finite number"));
        assert_eq!(store.projects().len(), 1);

        let reopened = ProjectStore::open(storage, clock());
        assert!(reopened.error().is_none());
        assert_eq!(reopened.projects().len(), 1);
    }

    #[test]
    fn test_delete_project() {
        let (mut store, _) = store();
        let a = store.create_project(NewProject::named("A")).unwrap();
        let b = store.create_project(NewProject::named("B")).unwrap();

        assert!(!store.delete_project("missing"));
        assert_eq!(store.projects().len(), 2);

        assert!(store.delete_project(&b.id));
        assert_eq!(store.projects().len(), 1);
        assert_eq!(store.projects()[0].id, a.id);
        assert!(store.current_project().is_none());
    }

    #[test]
    fn test_select_project_by_id() {
        let (mut store, _) = store();
        let a = store.create_project(NewProject::named("A")).unwrap();
        store.create_project(NewProject::named("B"));

        assert_eq!(store.select_project(&a.id), Some(a.clone()));
        assert_eq!(store.current_project(), Some(&a));

        assert!(store.select_project("missing").is_none());
        assert_eq!(store.error(), Some("Project not found"));
        assert_eq!(store.current_project(), Some(&a));
    }

    #[test]
    fn test_artifacts_without_current_project() {
        let (mut store, _) = store();
        store.create_project(NewProject::named("A"));
        store.set_current_project(None);

        assert!(store.add_artifact(NewArtifact::new("sipoc", ArtifactStatus::Draft)).is_none());
        assert!(!store.delete_artifact("x"));
        assert!(store.error().is_none());

        // Updating is the exception: a missing artifact is an error
        assert!(store.update_artifact("x", ArtifactPatch::default()).is_none());
        assert_eq!(store.error(), Some("Artifact not found"));
    }

    #[test]
    fn test_artifact_lifecycle() {
        let (mut store, _) = store();
        let project = store.create_project(NewProject::named("A")).unwrap();

        let artifact = store.add_artifact(NewArtifact::new("sipoc", ArtifactStatus::Draft)).unwrap();
        let updated = store
            .update_artifact(&artifact.id, ArtifactPatch::status(ArtifactStatus::Completed))
            .unwrap();
        assert!(updated.updated_at > artifact.updated_at);

        let stored = store.project(&project.id).unwrap();
        assert_eq!(stored.artifacts.len(), 1);
        assert_eq!(stored.artifacts[0].status, ArtifactStatus::Completed);
        assert!(stored.updated_at > project.updated_at);

        assert!(!store.delete_artifact("unknown"));
        assert_eq!(store.error(), Some("Artifact not found"));

        assert!(store.delete_artifact(&artifact.id));
        assert!(store.project(&project.id).unwrap().artifacts.is_empty());
    }

    #[test]
    fn test_filters_and_recent() {
        let (mut store, _) = store();
        let a = store.create_project(NewProject::named("A")).unwrap();
        store.add_artifact(NewArtifact::new("sipoc", ArtifactStatus::Draft));
        store.create_project(NewProject::named("B"));
        store.add_artifact(NewArtifact::new("fmea", ArtifactStatus::Draft));
        store.update_project(
            &a.id,
            ProjectPatch {
                status: Some(ProjectStatus::Completed),
                current_phase: Some("control".to_string()),
                ..ProjectPatch::default()
            },
        );

        assert_eq!(store.projects_by_status(&ProjectStatus::Completed).len(), 1);
        assert_eq!(store.projects_by_status(&ProjectStatus::Active).len(), 1);
        assert_eq!(store.projects_by_phase("define").len(), 1);
        assert_eq!(store.projects_by_phase("control")[0].id, a.id);

        let recent = store.recent_artifacts(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].artifact.artifact_type, "fmea");
        assert_eq!(recent[0].project_name, "B");
    }

    #[test]
    fn test_persist_and_reload() {
        let (mut store, storage) = store();
        store.create_project(NewProject::named("A"));
        store.add_artifact(NewArtifact::new("sipoc", ArtifactStatus::Completed));
        store.create_project(NewProject::named("B"));

        let reloaded = ProjectStore::open(storage, clock());
        assert_eq!(reloaded.projects(), store.projects());
        assert_eq!(reloaded.metrics(), store.metrics());
        assert!(reloaded.current_project().is_none());
        assert!(!reloaded.loading());
    }

    #[test]
    fn test_empty_collection_is_persisted() {
        let (mut store, storage) = store();
        let a = store.create_project(NewProject::named("A")).unwrap();
        store.delete_project(&a.id);

        assert_eq!(storage.get(PROJECTS_KEY).unwrap().as_deref(), Some("[]"));
        let reloaded = ProjectStore::open(storage, clock());
        assert!(reloaded.projects().is_empty());
    }

    #[test]
    fn test_load_failure_keeps_collection() {
        let (mut store, storage) = store();
        store.create_project(NewProject::named("A"));
        storage.set(PROJECTS_KEY, "{broken").unwrap();

        store.load_projects();
        assert_eq!(store.error(), Some("Failed to load projects"));
        assert!(!store.loading());
        assert_eq!(store.projects().len(), 1);
    }

    #[test]
    fn test_subscribers_see_each_state() {
        let (mut store, _) = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = store.subscribe(move |state| sink.borrow_mut().push(state.projects.len()));

        store.create_project(NewProject::named("A"));
        assert!(!seen.borrow().is_empty());
        assert_eq!(*seen.borrow().last().unwrap(), 1);

        assert!(store.unsubscribe(id));
        let count = seen.borrow().len();
        store.create_project(NewProject::named("B"));
        assert_eq!(seen.borrow().len(), count);
    }

    #[derive(Debug, Default)]
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn remove(&self, _key: &str) -> StorageResult<()> {
            Ok(())
        }

        fn keys(&self) -> StorageResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_save_failure_is_recorded() {
        let mut store = ProjectStore::open(Arc::new(ReadOnlyStore), clock());
        let created = store.create_project(NewProject::named("A"));

        assert!(created.is_some());
        assert_eq!(store.projects().len(), 1);
        assert_eq!(store.error(), Some("Failed to save projects"));
    }
}
