//! Workflow store state, settings and its transition function.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::phases::WorkflowType;

/// Process-wide workflow settings, persisted across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowSettings {
    /// Leaving a phase needs an approved tollgate
    #[serde(alias = "require_tollgate_approval")]
    pub require_tollgate_approval: bool,

    /// Stored and persisted, not consulted by phase advancement
    #[serde(alias = "auto_advance_phases")]
    pub auto_advance_phases: bool,

    /// Leaving a phase needs every required artifact completed
    #[serde(alias = "mandatory_artifacts")]
    pub mandatory_artifacts: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self { require_tollgate_approval: false, auto_advance_phases: false, mandatory_artifacts: true }
    }
}

impl WorkflowSettings {
    /// Shallow-merge `patch` into these settings.
    pub fn merge(&mut self, patch: &WorkflowSettingsPatch) {
        if let Some(v) = patch.require_tollgate_approval {
            self.require_tollgate_approval = v;
        }
        if let Some(v) = patch.auto_advance_phases {
            self.auto_advance_phases = v;
        }
        if let Some(v) = patch.mandatory_artifacts {
            self.mandatory_artifacts = v;
        }
    }
}

/// Partial settings update. Also the shape read back from storage, so a
/// stored document with missing keys keeps the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowSettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_tollgate_approval: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_advance_phases: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mandatory_artifacts: Option<bool>,
}

impl WorkflowSettingsPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.require_tollgate_approval.is_none()
            && self.auto_advance_phases.is_none()
            && self.mandatory_artifacts.is_none()
    }
}

/// Outcome of a tollgate review. A phase holds at most one; a later
/// decision replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DecisionRecord", into = "DecisionRecord")]
pub enum TollgateDecision {
    Approved { approved_by: String, approved_at: DateTime<Utc>, comments: String },
    Rejected {
        rejected_by: String,
        rejected_at: DateTime<Utc>,
        comments: String,
        required_actions: Vec<String>,
    },
}

impl TollgateDecision {
    /// Whether the tollgate was passed.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    /// Who made the decision.
    pub fn decided_by(&self) -> &str {
        match self {
            Self::Approved { approved_by, .. } => approved_by,
            Self::Rejected { rejected_by, .. } => rejected_by,
        }
    }

    /// When the decision was made.
    pub fn decided_at(&self) -> DateTime<Utc> {
        match self {
            Self::Approved { approved_at, .. } => *approved_at,
            Self::Rejected { rejected_at, .. } => *rejected_at,
        }
    }

    /// Reviewer comments.
    pub fn comments(&self) -> &str {
        match self {
            Self::Approved { comments, .. } | Self::Rejected { comments, .. } => comments,
        }
    }
}

/// Flat `{ approved: bool, ... }` layout of a decision on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionRecord {
    approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    comments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    required_actions: Option<Vec<String>>,
}

impl TryFrom<DecisionRecord> for TollgateDecision {
    type Error = String;

    fn try_from(record: DecisionRecord) -> Result<Self, Self::Error> {
        if record.approved {
            Ok(Self::Approved {
                approved_by: record.approved_by.ok_or("approval without approvedBy")?,
                approved_at: record.approved_at.ok_or("approval without approvedAt")?,
                comments: record.comments,
            })
        } else {
            Ok(Self::Rejected {
                rejected_by: record.rejected_by.ok_or("rejection without rejectedBy")?,
                rejected_at: record.rejected_at.ok_or("rejection without rejectedAt")?,
                comments: record.comments,
                required_actions: record.required_actions.unwrap_or_default(),
            })
        }
    }
}

impl From<TollgateDecision> for DecisionRecord {
    fn from(decision: TollgateDecision) -> Self {
        match decision {
            TollgateDecision::Approved { approved_by, approved_at, comments } => Self {
                approved: true,
                approved_by: Some(approved_by),
                approved_at: Some(approved_at),
                rejected_by: None,
                rejected_at: None,
                comments,
                required_actions: None,
            },
            TollgateDecision::Rejected { rejected_by, rejected_at, comments, required_actions } => {
                Self {
                    approved: false,
                    approved_by: None,
                    approved_at: None,
                    rejected_by: Some(rejected_by),
                    rejected_at: Some(rejected_at),
                    comments,
                    required_actions: Some(required_actions),
                }
            }
        }
    }
}

/// The ephemeral part of the workflow state: everything except settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkflowSession {
    pub current_workflow: Option<WorkflowType>,
    pub current_phase: Option<String>,
    #[serde(deserialize_with = "deserialize_progress")]
    pub phase_progress: BTreeMap<String, f64>,
    pub tollgate_approvals: BTreeMap<String, TollgateDecision>,
}

/// `null` entries (NaN when written) read back as 0.
fn deserialize_progress<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(phase, value)| (phase, value.unwrap_or(0.0))).collect())
}

/// Snapshot of the workflow store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    /// Selected methodology
    pub current_workflow: Option<WorkflowType>,
    /// Active phase id within the methodology
    pub current_phase: Option<String>,
    /// Caller-reported progress per phase id
    pub phase_progress: BTreeMap<String, f64>,
    /// Tollgate decisions per phase id
    pub tollgate_approvals: BTreeMap<String, TollgateDecision>,
    /// Persisted settings
    pub workflow_settings: WorkflowSettings,
    /// Whether an operation is in flight
    pub loading: bool,
    /// Last error message
    pub error: Option<String>,
}

impl WorkflowState {
    /// Fresh state with the given settings.
    pub fn with_settings(workflow_settings: WorkflowSettings) -> Self {
        Self { workflow_settings, ..Self::default() }
    }

    /// Copy out the ephemeral session part.
    pub fn session(&self) -> WorkflowSession {
        WorkflowSession {
            current_workflow: self.current_workflow,
            current_phase: self.current_phase.clone(),
            phase_progress: self.phase_progress.clone(),
            tollgate_approvals: self.tollgate_approvals.clone(),
        }
    }
}

/// Transitions of the workflow store.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    SetLoading(bool),
    SetError(String),
    ClearError,
    SetWorkflow(WorkflowType),
    SetPhase(String),
    UpdatePhaseProgress { phase: String, progress: f64 },
    ApproveTollgate { phase: String, approved_by: String, approved_at: DateTime<Utc>, comments: String },
    RejectTollgate {
        phase: String,
        rejected_by: String,
        rejected_at: DateTime<Utc>,
        comments: String,
        required_actions: Vec<String>,
    },
    UpdateWorkflowSettings(WorkflowSettingsPatch),
    RestoreSession(WorkflowSession),
    ResetWorkflow,
}

impl WorkflowAction {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetLoading(_) => "set_loading",
            Self::SetError(_) => "set_error",
            Self::ClearError => "clear_error",
            Self::SetWorkflow(_) => "set_workflow",
            Self::SetPhase(_) => "set_phase",
            Self::UpdatePhaseProgress { .. } => "update_phase_progress",
            Self::ApproveTollgate { .. } => "approve_tollgate",
            Self::RejectTollgate { .. } => "reject_tollgate",
            Self::UpdateWorkflowSettings(_) => "update_workflow_settings",
            Self::RestoreSession(_) => "restore_session",
            Self::ResetWorkflow => "reset_workflow",
        }
    }
}

/// Apply `action` to `state`, producing the next state.
pub fn reduce(state: &WorkflowState, action: WorkflowAction) -> WorkflowState {
    match action {
        WorkflowAction::SetLoading(loading) => WorkflowState { loading, ..state.clone() },
        WorkflowAction::SetError(message) => {
            WorkflowState { error: Some(message), loading: false, ..state.clone() }
        }
        WorkflowAction::ClearError => WorkflowState { error: None, ..state.clone() },
        WorkflowAction::SetWorkflow(workflow) => WorkflowState {
            current_workflow: Some(workflow),
            current_phase: Some(workflow.first_phase().id.to_string()),
            phase_progress: BTreeMap::new(),
            tollgate_approvals: BTreeMap::new(),
            ..state.clone()
        },
        WorkflowAction::SetPhase(phase) => {
            WorkflowState { current_phase: Some(phase), ..state.clone() }
        }
        WorkflowAction::UpdatePhaseProgress { phase, progress } => {
            let mut phase_progress = state.phase_progress.clone();
            phase_progress.insert(phase, progress);
            WorkflowState { phase_progress, ..state.clone() }
        }
        WorkflowAction::ApproveTollgate { phase, approved_by, approved_at, comments } => {
            let decision = TollgateDecision::Approved { approved_by, approved_at, comments };
            with_decision(state, phase, decision)
        }
        WorkflowAction::RejectTollgate {
            phase,
            rejected_by,
            rejected_at,
            comments,
            required_actions,
        } => {
            let decision =
                TollgateDecision::Rejected { rejected_by, rejected_at, comments, required_actions };
            with_decision(state, phase, decision)
        }
        WorkflowAction::UpdateWorkflowSettings(patch) => {
            let mut workflow_settings = state.workflow_settings;
            workflow_settings.merge(&patch);
            WorkflowState { workflow_settings, ..state.clone() }
        }
        WorkflowAction::RestoreSession(session) => WorkflowState {
            current_workflow: session.current_workflow,
            current_phase: session.current_phase,
            phase_progress: session.phase_progress,
            tollgate_approvals: session.tollgate_approvals,
            ..state.clone()
        },
        WorkflowAction::ResetWorkflow => WorkflowState {
            current_workflow: None,
            current_phase: None,
            phase_progress: BTreeMap::new(),
            tollgate_approvals: BTreeMap::new(),
            ..state.clone()
        },
    }
}

fn with_decision(state: &WorkflowState, phase: String, decision: TollgateDecision) -> WorkflowState {
    let mut tollgate_approvals = state.tollgate_approvals.clone();
    tollgate_approvals.insert(phase, decision);
    WorkflowState { tollgate_approvals, ..state.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn approve(phase: &str) -> WorkflowAction {
        WorkflowAction::ApproveTollgate {
            phase: phase.to_string(),
            approved_by: "champion".to_string(),
            approved_at: at(),
            comments: String::new(),
        }
    }

    #[test]
    fn test_set_workflow_resets_session() {
        let mut state = reduce(&WorkflowState::default(), WorkflowAction::SetWorkflow(WorkflowType::Dmaic));
        state = reduce(&state, WorkflowAction::SetPhase("measure".to_string()));
        state = reduce(
            &state,
            WorkflowAction::UpdatePhaseProgress { phase: "measure".to_string(), progress: 40.0 },
        );
        state = reduce(&state, approve("define"));

        let state = reduce(&state, WorkflowAction::SetWorkflow(WorkflowType::Kaizen));
        assert_eq!(state.current_workflow, Some(WorkflowType::Kaizen));
        assert_eq!(state.current_phase.as_deref(), Some("before"));
        assert!(state.phase_progress.is_empty());
        assert!(state.tollgate_approvals.is_empty());
    }

    #[test]
    fn test_later_decision_overwrites() {
        let state = reduce(&WorkflowState::default(), approve("define"));
        let state = reduce(
            &state,
            WorkflowAction::RejectTollgate {
                phase: "define".to_string(),
                rejected_by: "sponsor".to_string(),
                rejected_at: at(),
                comments: "scope unclear".to_string(),
                required_actions: vec!["Narrow scope".to_string()],
            },
        );

        assert_eq!(state.tollgate_approvals.len(), 1);
        let decision = &state.tollgate_approvals["define"];
        assert!(!decision.is_approved());
        assert_eq!(decision.decided_by(), "sponsor");
        assert_eq!(decision.comments(), "scope unclear");
    }

    #[test]
    fn test_session_null_progress_reads_as_zero() {
        let value = json!({
            "currentWorkflow": "dmaic",
            "currentPhase": "define",
            "phaseProgress": { "define": null, "measure": 40.0 }
        });
        let session: WorkflowSession = serde_json::from_value(value).unwrap();

        assert_eq!(session.current_workflow, Some(WorkflowType::Dmaic));
        assert_eq!(session.phase_progress["define"], 0.0);
        assert_eq!(session.phase_progress["measure"], 40.0);
        assert!(session.tollgate_approvals.is_empty());
    }

    #[test]
    fn test_settings_merge_is_shallow() {
        let patch = WorkflowSettingsPatch {
            require_tollgate_approval: Some(true),
            ..WorkflowSettingsPatch::default()
        };
        let state = reduce(&WorkflowState::default(), WorkflowAction::UpdateWorkflowSettings(patch));

        assert!(state.workflow_settings.require_tollgate_approval);
        assert!(state.workflow_settings.mandatory_artifacts);
        assert!(!state.workflow_settings.auto_advance_phases);
    }

    #[test]
    fn test_reset_keeps_settings() {
        let settings = WorkflowSettings { require_tollgate_approval: true, ..WorkflowSettings::default() };
        let state = reduce(
            &WorkflowState::with_settings(settings),
            WorkflowAction::SetWorkflow(WorkflowType::Dmaic),
        );
        let state = reduce(&state, WorkflowAction::ResetWorkflow);

        assert_eq!(state.current_workflow, None);
        assert_eq!(state.current_phase, None);
        assert_eq!(state.workflow_settings, settings);
    }

    #[test]
    fn test_decision_wire_layout() {
        let approved = TollgateDecision::Approved {
            approved_by: "champion".to_string(),
            approved_at: at(),
            comments: "ok".to_string(),
        };
        let value = serde_json::to_value(&approved).unwrap();
        assert_eq!(value["approved"], true);
        assert_eq!(value["approvedBy"], "champion");
        assert!(value.get("rejectedBy").is_none());

        let rejected: TollgateDecision = serde_json::from_value(json!({
            "approved": false,
            "rejectedBy": "sponsor",
            "rejectedAt": "2024-06-01T10:00:00Z",
            "comments": "",
            "requiredActions": ["Redo SIPOC"]
        }))
        .unwrap();
        assert_eq!(rejected.decided_at(), at());

        let broken = serde_json::from_value::<TollgateDecision>(json!({ "approved": true }));
        assert!(broken.is_err());
    }

    #[test]
    fn test_settings_accept_both_key_styles() {
        let camel: WorkflowSettings =
            serde_json::from_value(json!({ "requireTollgateApproval": true })).unwrap();
        let snake: WorkflowSettings =
            serde_json::from_value(json!({ "require_tollgate_approval": true })).unwrap();
        assert_eq!(camel, snake);
        assert!(camel.mandatory_artifacts);
    }

    #[test]
    fn test_session_roundtrip_through_state() {
        let mut state = reduce(&WorkflowState::default(), WorkflowAction::SetWorkflow(WorkflowType::Kaizen));
        state = reduce(&state, approve("before"));

        let session = state.session();
        let restored = reduce(&WorkflowState::default(), WorkflowAction::RestoreSession(session));
        assert_eq!(restored.current_phase.as_deref(), Some("before"));
        assert!(restored.tollgate_approvals["before"].is_approved());
    }
}
