//! The workflow store.
//!
//! Tracks which methodology is active, where in it the user is and which
//! tollgates were passed. Only the settings are persisted; the rest lives
//! as long as the store unless a caller carries it over with
//! [`WorkflowStore::snapshot_session`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::{
    load_json, save_json, Clock, KeyValueStore, StoreError, SubscriptionId, Subscribers,
    Timestamps, WORKFLOW_SETTINGS_KEY,
};
use crate::project::Project;

use super::gating::{gates_pass, missing_artifacts, phase_progress, PhaseArtifact};
use super::phases::{PhaseDefinition, WorkflowType};
use super::state::{
    reduce, TollgateDecision, WorkflowAction, WorkflowSession, WorkflowSettings,
    WorkflowSettingsPatch, WorkflowState,
};
use super::stats::{workflow_stats, WorkflowStats};

const SAVE_FAILED: &str = "Failed to save workflow settings";

/// Workflow store.
///
/// Like the project store, actions record failures in `error` instead of
/// returning them.
#[derive(Debug)]
pub struct WorkflowStore {
    state: Arc<WorkflowState>,
    storage: Arc<dyn KeyValueStore>,
    stamps: Timestamps,
    subscribers: Subscribers<WorkflowState>,
}

impl WorkflowStore {
    /// Create a store with `defaults` as settings. Nothing is read.
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        defaults: WorkflowSettings,
    ) -> Self {
        Self {
            state: Arc::new(WorkflowState::with_settings(defaults)),
            storage,
            stamps: Timestamps::new(clock),
            subscribers: Subscribers::new(),
        }
    }

    /// Create a store and merge the persisted settings over `defaults`.
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        defaults: WorkflowSettings,
    ) -> Self {
        let mut store = Self::new(storage, clock, defaults);
        store.load_settings();
        store
    }

    fn load_settings(&mut self) {
        match load_json::<WorkflowSettingsPatch>(self.storage.as_ref(), WORKFLOW_SETTINGS_KEY) {
            Ok(Some(stored)) => {
                tracing::debug!(?stored, "loaded workflow settings");
                self.dispatch(WorkflowAction::UpdateWorkflowSettings(stored));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "ignoring stored workflow settings"),
        }
    }

    // --- State access ---

    /// Current state snapshot.
    pub fn snapshot(&self) -> Arc<WorkflowState> {
        Arc::clone(&self.state)
    }

    /// Active methodology.
    pub fn current_workflow(&self) -> Option<WorkflowType> {
        self.state.current_workflow
    }

    /// Active phase id.
    pub fn current_phase(&self) -> Option<&str> {
        self.state.current_phase.as_deref()
    }

    /// Caller-reported progress per phase.
    pub fn phase_progress(&self) -> &BTreeMap<String, f64> {
        &self.state.phase_progress
    }

    /// Tollgate decisions per phase.
    pub fn tollgate_approvals(&self) -> &BTreeMap<String, TollgateDecision> {
        &self.state.tollgate_approvals
    }

    /// Current settings.
    pub fn workflow_settings(&self) -> &WorkflowSettings {
        &self.state.workflow_settings
    }

    /// Whether an operation is in flight.
    pub fn loading(&self) -> bool {
        self.state.loading
    }

    /// Last error message.
    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    /// Register a listener called with every new state.
    pub fn subscribe(&mut self, listener: impl Fn(&WorkflowState) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(listener)
    }

    /// Remove a listener.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    // --- Phase navigation ---

    /// Definition of the active phase.
    pub fn current_phase_data(&self) -> Option<&'static PhaseDefinition> {
        let workflow = self.state.current_workflow?;
        workflow.phase(self.state.current_phase.as_deref()?)
    }

    /// Phase after the active one.
    pub fn next_phase(&self) -> Option<&'static PhaseDefinition> {
        self.neighbour(1)
    }

    /// Phase before the active one.
    pub fn previous_phase(&self) -> Option<&'static PhaseDefinition> {
        self.neighbour(-1)
    }

    fn neighbour(&self, offset: isize) -> Option<&'static PhaseDefinition> {
        let workflow = self.state.current_workflow?;
        let index = workflow.phase_index(self.state.current_phase.as_deref()?)?;
        workflow.phases().get(index.checked_add_signed(offset)?)
    }

    /// Whether the gates of the active phase pass for `artifacts`.
    pub fn can_advance_to_next_phase<A: PhaseArtifact>(&self, artifacts: &[A]) -> bool {
        let Some(phase) = self.current_phase_data() else {
            return false;
        };
        let decision = self.state.tollgate_approvals.get(phase.id);
        gates_pass(phase, &self.state.workflow_settings, decision, artifacts)
    }

    /// Required artifact types of the active phase without a completed
    /// artifact in `artifacts`.
    pub fn missing_artifacts<A: PhaseArtifact>(&self, artifacts: &[A]) -> Vec<&'static str> {
        self.current_phase_data()
            .map(|phase| missing_artifacts(phase, artifacts))
            .unwrap_or_default()
    }

    /// Rounded completion percentage of the active phase for `artifacts`.
    pub fn calculate_phase_progress<A: PhaseArtifact>(&self, artifacts: &[A]) -> u32 {
        self.current_phase_data().map_or(0, |phase| phase_progress(phase, artifacts))
    }

    // --- Actions ---

    /// Select a methodology by key.
    pub fn set_workflow(&mut self, workflow: &str) -> bool {
        match workflow.parse::<WorkflowType>() {
            Ok(workflow) => {
                self.select_workflow(workflow);
                true
            }
            Err(_) => {
                self.fail(StoreError::InvalidWorkflow(workflow.to_string()));
                false
            }
        }
    }

    /// Select a methodology, starting at its first phase with no progress
    /// or decisions.
    pub fn select_workflow(&mut self, workflow: WorkflowType) {
        tracing::info!(%workflow, "selected workflow");
        self.dispatch(WorkflowAction::SetWorkflow(workflow));
    }

    /// Jump to a phase of the active methodology.
    pub fn set_phase(&mut self, phase: &str) -> bool {
        let known = self.state.current_workflow.and_then(|w| w.phase(phase)).is_some();
        if !known {
            self.fail(StoreError::InvalidPhase(phase.to_string()));
            return false;
        }
        self.dispatch(WorkflowAction::SetPhase(phase.to_string()));
        true
    }

    /// Move to the next phase if the gates pass.
    pub fn advance_to_next_phase<A: PhaseArtifact>(
        &mut self,
        artifacts: &[A],
    ) -> Option<&'static PhaseDefinition> {
        match self.try_advance(artifacts) {
            Ok(next) => Some(next),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn try_advance<A: PhaseArtifact>(
        &mut self,
        artifacts: &[A],
    ) -> Result<&'static PhaseDefinition, StoreError> {
        if !self.can_advance_to_next_phase(artifacts) {
            return Err(StoreError::RequirementsNotMet);
        }
        let next = self.next_phase().ok_or(StoreError::FinalPhase)?;
        tracing::info!(phase = next.id, "advanced workflow phase");
        self.dispatch(WorkflowAction::SetPhase(next.id.to_string()));
        Ok(next)
    }

    /// Record caller-computed progress for a phase.
    pub fn update_phase_progress(&mut self, phase: &str, progress: f64) {
        if !progress.is_finite() {
            self.fail(StoreError::NotFinite("Progress"));
            return;
        }
        self.dispatch(WorkflowAction::UpdatePhaseProgress { phase: phase.to_string(), progress });
    }

    /// Record an approval for `phase`, replacing any earlier decision.
    pub fn approve_tollgate(&mut self, phase: &str, approved_by: &str, comments: &str) {
        let approved_at = self.stamps.next();
        tracing::info!(phase, approved_by, "tollgate approved");
        self.dispatch(WorkflowAction::ApproveTollgate {
            phase: phase.to_string(),
            approved_by: approved_by.to_string(),
            approved_at,
            comments: comments.to_string(),
        });
    }

    /// Record a rejection for `phase`, replacing any earlier decision.
    pub fn reject_tollgate(
        &mut self,
        phase: &str,
        rejected_by: &str,
        comments: &str,
        required_actions: Vec<String>,
    ) {
        let rejected_at = self.stamps.next();
        tracing::info!(phase, rejected_by, "tollgate rejected");
        self.dispatch(WorkflowAction::RejectTollgate {
            phase: phase.to_string(),
            rejected_by: rejected_by.to_string(),
            rejected_at,
            comments: comments.to_string(),
            required_actions,
        });
    }

    /// Merge `patch` into the settings and persist them.
    pub fn update_workflow_settings(&mut self, patch: WorkflowSettingsPatch) {
        self.dispatch(WorkflowAction::UpdateWorkflowSettings(patch));
        self.persist_settings();
    }

    /// Drop the methodology, phase, progress and decisions. Settings stay.
    pub fn reset_workflow(&mut self) {
        self.dispatch(WorkflowAction::ResetWorkflow);
    }

    /// Clear the recorded error.
    pub fn clear_error(&mut self) {
        self.dispatch(WorkflowAction::ClearError);
    }

    /// Statistics over `projects` for the active methodology.
    pub fn workflow_stats(&self, projects: &[Project]) -> WorkflowStats {
        workflow_stats(projects, self.state.current_workflow, &self.state.tollgate_approvals)
    }

    // --- Session carry-over ---

    /// Copy out everything except the settings.
    pub fn snapshot_session(&self) -> WorkflowSession {
        self.state.session()
    }

    /// Replace the session part of the state with `session`.
    ///
    /// A session whose phase is not part of its methodology is refused and
    /// the store keeps its current state.
    pub fn restore_session(&mut self, session: WorkflowSession) -> bool {
        let consistent = match (session.current_workflow, session.current_phase.as_deref()) {
            (Some(workflow), Some(phase)) => workflow.phase(phase).is_some(),
            (None, None) => true,
            _ => false,
        };
        if !consistent {
            tracing::warn!(
                workflow = ?session.current_workflow,
                phase = ?session.current_phase,
                "ignoring inconsistent workflow session"
            );
            return false;
        }
        for decision in session.tollgate_approvals.values() {
            self.stamps.observe(decision.decided_at());
        }
        self.dispatch(WorkflowAction::RestoreSession(session));
        true
    }

    // --- Internals ---

    fn dispatch(&mut self, action: WorkflowAction) {
        tracing::debug!(action = action.name(), "workflow action");
        let next = reduce(&self.state, action);
        if next == *self.state {
            return;
        }
        self.state = Arc::new(next);
        self.subscribers.notify(&self.state);
    }

    fn persist_settings(&mut self) {
        let settings = self.state.workflow_settings;
        match save_json(self.storage.as_ref(), WORKFLOW_SETTINGS_KEY, &settings) {
            Ok(()) => tracing::debug!(?settings, "saved workflow settings"),
            Err(e) => self.fail(StoreError::storage(SAVE_FAILED, e)),
        }
    }

    fn fail(&mut self, error: StoreError) {
        match std::error::Error::source(&error) {
            Some(source) => tracing::warn!(%error, %source, "workflow action failed"),
            None => tracing::warn!(%error, "workflow action failed"),
        }
        self.dispatch(WorkflowAction::SetError(error.to_string()));
    }
}
