//! Project and artifact data types.
//!
//! Field names serialize in camelCase so the stored collection keeps the
//! `lss_projects` document layout.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::workflow::{PhaseArtifact, WorkflowType};

/// Phase a new project starts in.
pub const DEFAULT_PHASE: &str = "define";

/// Lifecycle status of a project.
///
/// Only `completed` carries meaning for metrics; any other string is kept
/// as [`ProjectStatus::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectStatus {
    #[default]
    Active,
    Completed,
    OnHold,
    Custom(String),
}

impl ProjectStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
            Self::Custom(s) => s,
        }
    }

    /// Whether the project is finished.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl From<String> for ProjectStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => Self::Active,
            "completed" => Self::Completed,
            "on_hold" => Self::OnHold,
            _ => Self::Custom(s),
        }
    }
}

impl From<ProjectStatus> for String {
    fn from(status: ProjectStatus) -> Self {
        match status {
            ProjectStatus::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an artifact. Workflow gating only looks for `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtifactStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Custom(String),
}

impl ArtifactStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Custom(s) => s,
        }
    }

    /// Whether the artifact counts towards phase completion.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl From<String> for ArtifactStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "draft" => Self::Draft,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Custom(s),
        }
    }
}

impl From<ArtifactStatus> for String {
    fn from(status: ArtifactStatus) -> Self {
        match status {
            ArtifactStatus::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for ArtifactStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An improvement project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique id, never reused
    pub id: String,

    /// Display name
    pub name: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Team members
    #[serde(default)]
    pub team: Vec<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: ProjectStatus,

    /// Phase tag the project is in
    #[serde(default = "default_phase")]
    pub current_phase: String,

    /// Completion percentage, maintained by the caller
    #[serde(default, deserialize_with = "deserialize_number")]
    pub progress: f64,

    /// Realized savings
    #[serde(default, deserialize_with = "deserialize_number")]
    pub savings: f64,

    /// Methodology the project follows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<WorkflowType>,

    /// Project start
    #[serde(default, deserialize_with = "deserialize_date", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,

    /// Project end, used for cycle time
    #[serde(default, deserialize_with = "deserialize_date", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    /// Work products, in display order
    #[serde(default)]
    pub artifacts: Vec<Artifact>,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last mutation time
    pub updated_at: DateTime<Utc>,

    /// Any other caller-supplied fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_phase() -> String {
    DEFAULT_PHASE.to_string()
}

impl Project {
    /// Build a project from caller input, applying creation defaults.
    pub fn create(id: String, data: NewProject, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: data.name,
            description: data.description,
            team: data.team,
            status: data.status.unwrap_or_default(),
            current_phase: data.current_phase.unwrap_or_else(default_phase),
            progress: data.progress.unwrap_or(0.0),
            savings: data.savings.unwrap_or(0.0),
            workflow_type: data.workflow_type,
            start_date: Some(data.start_date.unwrap_or(now)),
            end_date: data.end_date,
            artifacts: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: data.extra,
        }
    }

    /// Find an artifact by id.
    pub fn artifact(&self, id: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    /// Cycle time in whole days (rounded up), if both dates are known.
    pub fn cycle_days(&self) -> Option<i64> {
        let (start, end) = (self.start_date?, self.end_date?);
        let millis = (end - start).num_milliseconds();
        Some((millis as f64 / MILLIS_PER_DAY).ceil() as i64)
    }
}

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A unit of work product attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique id
    pub id: String,

    /// Type tag, matched against a phase's artifact vocabulary
    #[serde(rename = "type")]
    pub artifact_type: String,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Status
    #[serde(default)]
    pub status: ArtifactStatus,

    /// Artifact body
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last mutation time
    pub updated_at: DateTime<Utc>,

    /// Any other caller-supplied fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Artifact {
    /// Build an artifact from caller input.
    pub fn create(id: String, data: NewArtifact, now: DateTime<Utc>) -> Self {
        Self {
            id,
            artifact_type: data.artifact_type,
            name: data.name,
            status: data.status.unwrap_or_default(),
            data: data.data,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }
}

impl PhaseArtifact for Artifact {
    fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

/// Caller input for a new project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub team: Vec<String>,
    pub status: Option<ProjectStatus>,
    pub current_phase: Option<String>,
    pub progress: Option<f64>,
    pub savings: Option<f64>,
    pub workflow_type: Option<WorkflowType>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub extra: Map<String, Value>,
}

impl NewProject {
    /// Input with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Name of the first numeric field that is NaN or infinite.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        non_finite_field(self.progress, self.savings)
    }
}

fn non_finite_field(progress: Option<f64>, savings: Option<f64>) -> Option<&'static str> {
    if progress.is_some_and(|v| !v.is_finite()) {
        Some("Progress")
    } else if savings.is_some_and(|v| !v.is_finite()) {
        Some("Savings")
    } else {
        None
    }
}

/// Partial update of a project. `Some` fields overwrite, `extra` entries
/// are merged key by key.
///
/// Optional project fields take `Some(None)` to clear them.
#[derive(Debug, Clone, Default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub team: Option<Vec<String>>,
    pub status: Option<ProjectStatus>,
    pub current_phase: Option<String>,
    pub progress: Option<f64>,
    pub savings: Option<f64>,
    pub workflow_type: Option<Option<WorkflowType>>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub extra: Map<String, Value>,
}

impl ProjectPatch {
    /// Merge this patch over `project`. Does not touch `updated_at`.
    pub fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(description) = self.description {
            project.description = description;
        }
        if let Some(team) = self.team {
            project.team = team;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(phase) = self.current_phase {
            project.current_phase = phase;
        }
        if let Some(progress) = self.progress {
            project.progress = progress;
        }
        if let Some(savings) = self.savings {
            project.savings = savings;
        }
        if let Some(workflow_type) = self.workflow_type {
            project.workflow_type = workflow_type;
        }
        if let Some(start) = self.start_date {
            project.start_date = start;
        }
        if let Some(end) = self.end_date {
            project.end_date = end;
        }
        project.extra.extend(self.extra);
    }

    /// Name of the first numeric field that is NaN or infinite.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        non_finite_field(self.progress, self.savings)
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.team.is_none()
            && self.status.is_none()
            && self.current_phase.is_none()
            && self.progress.is_none()
            && self.savings.is_none()
            && self.workflow_type.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.extra.is_empty()
    }
}

/// Caller input for a new artifact.
#[derive(Debug, Clone, Default)]
pub struct NewArtifact {
    pub artifact_type: String,
    pub name: Option<String>,
    pub status: Option<ArtifactStatus>,
    pub data: Value,
}

impl NewArtifact {
    /// Input with a type tag and status.
    pub fn new(artifact_type: impl Into<String>, status: ArtifactStatus) -> Self {
        Self { artifact_type: artifact_type.into(), status: Some(status), ..Self::default() }
    }
}

/// Partial update of an artifact.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPatch {
    pub artifact_type: Option<String>,
    pub name: Option<String>,
    pub status: Option<ArtifactStatus>,
    pub data: Option<Value>,
}

impl ArtifactPatch {
    /// Patch that only changes the status.
    pub fn status(status: ArtifactStatus) -> Self {
        Self { status: Some(status), ..Self::default() }
    }

    /// Merge this patch over `artifact`. Does not touch `updated_at`.
    pub fn apply(self, artifact: &mut Artifact) {
        if let Some(artifact_type) = self.artifact_type {
            artifact.artifact_type = artifact_type;
        }
        if let Some(name) = self.name {
            artifact.name = Some(name);
        }
        if let Some(status) = self.status {
            artifact.status = status;
        }
        if let Some(data) = self.data {
            artifact.data = data;
        }
    }
}

/// An artifact tagged with the project it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentArtifact {
    #[serde(flatten)]
    pub artifact: Artifact,
    pub project_id: String,
    pub project_name: String,
}

impl PhaseArtifact for RecentArtifact {
    fn artifact_type(&self) -> &str {
        &self.artifact.artifact_type
    }

    fn is_completed(&self) -> bool {
        self.artifact.status.is_completed()
    }
}

/// Parse a timestamp given either as RFC 3339 or as a bare `YYYY-MM-DD`
/// date (taken as midnight UTC).
pub fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// `null` (what JSON writers emit for NaN) reads back as 0.
fn deserialize_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_datetime(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_create_applies_defaults() {
        let project = Project::create("p1".to_string(), NewProject::named("Reduce scrap"), now());

        assert_eq!(project.status, ProjectStatus::Active);
        assert_eq!(project.current_phase, "define");
        assert_eq!(project.savings, 0.0);
        assert_eq!(project.progress, 0.0);
        assert!(project.artifacts.is_empty());
        assert!(project.team.is_empty());
        assert_eq!(project.start_date, Some(now()));
        assert_eq!(project.created_at, project.updated_at);
    }

    #[test]
    fn test_create_keeps_overrides() {
        let data = NewProject {
            name: "Kaizen blitz".to_string(),
            savings: Some(250.0),
            status: Some(ProjectStatus::OnHold),
            workflow_type: Some(WorkflowType::Kaizen),
            current_phase: Some("before".to_string()),
            ..NewProject::default()
        };
        let project = Project::create("p2".to_string(), data, now());

        assert_eq!(project.savings, 250.0);
        assert_eq!(project.status, ProjectStatus::OnHold);
        assert_eq!(project.current_phase, "before");
    }

    #[test]
    fn test_status_string_roundtrip() {
        assert_eq!(ProjectStatus::from("completed".to_string()), ProjectStatus::Completed);
        assert_eq!(
            ProjectStatus::from("cancelled".to_string()),
            ProjectStatus::Custom("cancelled".to_string())
        );
        assert_eq!(String::from(ProjectStatus::OnHold), "on_hold");
        assert_eq!("in_progress".parse::<ArtifactStatus>().unwrap(), ArtifactStatus::InProgress);
        assert!(ArtifactStatus::Completed.is_completed());
        assert!(!ArtifactStatus::Custom("done".to_string()).is_completed());
    }

    #[test]
    fn test_project_json_layout() {
        let mut project = Project::create("p1".to_string(), NewProject::named("Scrap"), now());
        project.extra.insert("leadId".to_string(), json!("u-7"));
        let value = serde_json::to_value(&project).unwrap();

        assert_eq!(value["currentPhase"], "define");
        assert_eq!(value["status"], "active");
        assert_eq!(value["leadId"], "u-7");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("extra").is_none());
    }

    #[test]
    fn test_project_reads_sparse_documents() {
        let value = json!({
            "id": "abc",
            "name": "Legacy",
            "status": "completed",
            "startDate": "2024-01-01",
            "endDate": "2024-01-11T00:00:00.000Z",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "owner": "ops"
        });
        let project: Project = serde_json::from_value(value).unwrap();

        assert_eq!(project.savings, 0.0);
        assert_eq!(project.current_phase, "define");
        assert!(project.status.is_completed());
        assert_eq!(project.cycle_days(), Some(10));
        assert_eq!(project.extra.get("owner"), Some(&json!("ops")));
    }

    #[test]
    fn test_cycle_days_rounds_up() {
        let mut project = Project::create("p".to_string(), NewProject::named("x"), now());
        project.start_date = parse_datetime("2024-01-01");
        project.end_date = parse_datetime("2024-01-03T01:00:00Z");
        assert_eq!(project.cycle_days(), Some(3));

        project.end_date = None;
        assert_eq!(project.cycle_days(), None);
    }

    #[test]
    fn test_patch_merges_fields() {
        let mut project = Project::create("p".to_string(), NewProject::named("Old"), now());
        project.extra.insert("keep".to_string(), json!(1));

        let mut extra = Map::new();
        extra.insert("added".to_string(), json!(true));
        let patch = ProjectPatch {
            name: Some("New".to_string()),
            savings: Some(42.0),
            extra,
            ..ProjectPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut project);

        assert_eq!(project.name, "New");
        assert_eq!(project.savings, 42.0);
        assert_eq!(project.status, ProjectStatus::Active);
        assert_eq!(project.extra.len(), 2);
    }

    #[test]
    fn test_null_numbers_read_as_zero() {
        let value = json!({
            "id": "abc",
            "name": "Legacy",
            "progress": null,
            "savings": null,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        });
        let project: Project = serde_json::from_value(value).unwrap();

        assert_eq!(project.progress, 0.0);
        assert_eq!(project.savings, 0.0);
        assert!(project.extra.is_empty());
    }

    #[test]
    fn test_non_finite_numbers_are_flagged() {
        let patch = ProjectPatch { savings: Some(f64::INFINITY), ..ProjectPatch::default() };
        assert_eq!(patch.non_finite_field(), Some("Savings"));

        let data = NewProject { progress: Some(f64::NAN), ..NewProject::named("x") };
        assert_eq!(data.non_finite_field(), Some("Progress"));

        let patch = ProjectPatch { savings: Some(-10.5), ..ProjectPatch::default() };
        assert_eq!(patch.non_finite_field(), None);
    }

    #[test]
    fn test_patch_clears_optional_fields() {
        let data = NewProject {
            description: Some("wrongly closed".to_string()),
            end_date: parse_datetime("2024-02-01"),
            workflow_type: Some(WorkflowType::Dmaic),
            ..NewProject::named("Scrap")
        };
        let mut project = Project::create("p".to_string(), data, now());

        let patch = ProjectPatch {
            description: Some(None),
            end_date: Some(None),
            ..ProjectPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply(&mut project);

        assert!(project.description.is_none());
        assert!(project.end_date.is_none());
        assert_eq!(project.cycle_days(), None);
        assert_eq!(project.workflow_type, Some(WorkflowType::Dmaic));
    }

    #[test]
    fn test_artifact_keeps_unknown_fields() {
        let value = json!({
            "id": "a1",
            "type": "sipoc",
            "status": "completed",
            "reviewer": "qa-lead",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        });
        let artifact: Artifact = serde_json::from_value(value).unwrap();
        assert_eq!(artifact.extra.get("reviewer"), Some(&json!("qa-lead")));

        let written = serde_json::to_value(&artifact).unwrap();
        assert_eq!(written["reviewer"], "qa-lead");
        assert!(written.get("extra").is_none());
    }

    #[test]
    fn test_artifact_json_uses_type_key() {
        let artifact = Artifact::create(
            "a1".to_string(),
            NewArtifact::new("sipoc", ArtifactStatus::Completed),
            now(),
        );
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["type"], "sipoc");
        assert_eq!(value["status"], "completed");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_parse_datetime() {
        assert_eq!(
            parse_datetime("2024-01-11"),
            Some(Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_datetime("2024-01-11T10:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2024, 1, 11, 8, 30, 0).unwrap())
        );
        assert!(parse_datetime("last tuesday").is_none());
    }
}
