//! Aggregate metrics and queries over the project collection.

use serde::Serialize;

use super::model::{Project, RecentArtifact};

/// Fleet-wide project metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetrics {
    /// Projects not yet completed
    pub active_projects: usize,
    /// Completed projects
    pub completed_projects: usize,
    /// Sum of savings over all projects
    pub total_savings: f64,
    /// Mean cycle time of completed projects, in whole days
    pub avg_cycle_time: i64,
}

/// Compute metrics for a project collection.
///
/// Cycle time only counts completed projects with both a start and an end
/// date; each contributes its day count rounded up, and the mean is rounded
/// to the nearest day.
pub fn calculate_metrics(projects: &[Project]) -> ProjectMetrics {
    let completed_projects = projects.iter().filter(|p| p.status.is_completed()).count();
    let active_projects = projects.len() - completed_projects;
    let total_savings = projects.iter().map(|p| p.savings).sum();

    let cycle_days: Vec<i64> = projects
        .iter()
        .filter(|p| p.status.is_completed())
        .filter_map(Project::cycle_days)
        .collect();

    let avg_cycle_time = if cycle_days.is_empty() {
        0
    } else {
        let total: i64 = cycle_days.iter().sum();
        (total as f64 / cycle_days.len() as f64).round() as i64
    };

    ProjectMetrics { active_projects, completed_projects, total_savings, avg_cycle_time }
}

/// Artifacts across all projects, most recently updated first.
pub fn recent_artifacts(projects: &[Project], limit: usize) -> Vec<RecentArtifact> {
    let mut all: Vec<RecentArtifact> = projects
        .iter()
        .flat_map(|project| {
            project.artifacts.iter().map(move |artifact| RecentArtifact {
                artifact: artifact.clone(),
                project_id: project.id.clone(),
                project_name: project.name.clone(),
            })
        })
        .collect();

    all.sort_by(|a, b| b.artifact.updated_at.cmp(&a.artifact.updated_at));
    all.truncate(limit);
    all
}
