//! Aggregate workflow statistics over a project collection.

use std::collections::BTreeMap;

use serde::Serialize;

use super::phases::{WorkflowType, DMAIC_PHASES};
use super::state::TollgateDecision;
use crate::project::Project;

/// Number of projects sitting in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseCount {
    /// Phase id
    pub phase: &'static str,
    /// Phase display name
    pub name: &'static str,
    /// Projects whose current phase is this one
    pub projects: usize,
}

/// Workflow statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    /// Projects following DMAIC
    pub dmaic_projects: usize,
    /// Projects following Kaizen
    pub kaizen_projects: usize,
    /// Projects per phase, in phase order
    pub phase_distribution: Vec<PhaseCount>,
    /// Average days spent per phase. Always empty: phase entry and exit
    /// times are not recorded.
    pub avg_phase_time: BTreeMap<String, f64>,
    /// Approved decisions over all recorded decisions, as a rounded percentage
    pub tollgate_approval_rate: u32,
}

impl WorkflowStats {
    /// Count for a phase id, if the phase is part of the distribution.
    pub fn phase_count(&self, phase: &str) -> Option<usize> {
        self.phase_distribution.iter().find(|c| c.phase == phase).map(|c| c.projects)
    }
}

/// Compute statistics for `projects`.
///
/// The distribution covers the phases of `workflow`, or DMAIC when no
/// methodology is active.
pub fn workflow_stats(
    projects: &[Project],
    workflow: Option<WorkflowType>,
    approvals: &BTreeMap<String, TollgateDecision>,
) -> WorkflowStats {
    let count_type =
        |ty: WorkflowType| projects.iter().filter(|p| p.workflow_type == Some(ty)).count();

    let phases = workflow.map_or(DMAIC_PHASES, WorkflowType::phases);
    let phase_distribution = phases
        .iter()
        .map(|phase| PhaseCount {
            phase: phase.id,
            name: phase.name,
            projects: projects.iter().filter(|p| p.current_phase == phase.id).count(),
        })
        .collect();

    WorkflowStats {
        dmaic_projects: count_type(WorkflowType::Dmaic),
        kaizen_projects: count_type(WorkflowType::Kaizen),
        phase_distribution,
        avg_phase_time: BTreeMap::new(),
        tollgate_approval_rate: approval_rate(approvals),
    }
}

/// Rounded percentage of approved decisions; 0 with no decisions.
pub fn approval_rate(approvals: &BTreeMap<String, TollgateDecision>) -> u32 {
    if approvals.is_empty() {
        return 0;
    }
    let approved = approvals.values().filter(|d| d.is_approved()).count();
    (approved as f64 / approvals.len() as f64 * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::NewProject;
    use chrono::{TimeZone, Utc};

    fn project(phase: &str, workflow: Option<WorkflowType>) -> Project {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut project = Project::create(phase.to_string(), NewProject::named("P"), now);
        project.current_phase = phase.to_string();
        project.workflow_type = workflow;
        project
    }

    fn decision(approved: bool) -> TollgateDecision {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        if approved {
            TollgateDecision::Approved {
                approved_by: "a".to_string(),
                approved_at: at,
                comments: String::new(),
            }
        } else {
            TollgateDecision::Rejected {
                rejected_by: "r".to_string(),
                rejected_at: at,
                comments: String::new(),
                required_actions: Vec::new(),
            }
        }
    }

    #[test]
    fn test_counts_by_methodology() {
        let projects = vec![
            project("define", Some(WorkflowType::Dmaic)),
            project("measure", Some(WorkflowType::Dmaic)),
            project("before", Some(WorkflowType::Kaizen)),
            project("define", None),
        ];
        let stats = workflow_stats(&projects, None, &BTreeMap::new());

        assert_eq!(stats.dmaic_projects, 2);
        assert_eq!(stats.kaizen_projects, 1);
        assert_eq!(stats.phase_distribution.len(), 5);
        assert_eq!(stats.phase_count("define"), Some(2));
        assert_eq!(stats.phase_count("control"), Some(0));
        assert_eq!(stats.phase_count("before"), None);
        assert!(stats.avg_phase_time.is_empty());
    }

    #[test]
    fn test_distribution_follows_active_workflow() {
        let projects = vec![project("during", Some(WorkflowType::Kaizen))];
        let stats = workflow_stats(&projects, Some(WorkflowType::Kaizen), &BTreeMap::new());

        let ids: Vec<_> = stats.phase_distribution.iter().map(|c| c.phase).collect();
        assert_eq!(ids, vec!["before", "during", "after"]);
        assert_eq!(stats.phase_count("during"), Some(1));
    }

    #[test]
    fn test_approval_rate() {
        let mut approvals = BTreeMap::new();
        assert_eq!(approval_rate(&approvals), 0);

        approvals.insert("define".to_string(), decision(true));
        approvals.insert("measure".to_string(), decision(false));
        approvals.insert("analyze".to_string(), decision(false));
        assert_eq!(approval_rate(&approvals), 33);

        approvals.insert("analyze".to_string(), decision(true));
        assert_eq!(approval_rate(&approvals), 67);
    }
}
