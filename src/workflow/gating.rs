//! Phase gating and progress over a caller-supplied artifact list.
//!
//! Nothing here reads project storage. Callers pass the artifacts that
//! should count (usually the current project's) as a slice of anything that
//! implements [`PhaseArtifact`].

use std::collections::HashSet;

use super::phases::PhaseDefinition;
use super::state::{TollgateDecision, WorkflowSettings};

/// What gating needs to know about an artifact.
pub trait PhaseArtifact {
    /// Artifact type tag, e.g. `sipoc`.
    fn artifact_type(&self) -> &str;

    /// Whether the artifact counts as done.
    fn is_completed(&self) -> bool;
}

fn completed_types<A: PhaseArtifact>(artifacts: &[A]) -> HashSet<&str> {
    artifacts.iter().filter(|a| a.is_completed()).map(PhaseArtifact::artifact_type).collect()
}

/// Whether every required artifact type of `phase` has a completed artifact.
pub fn required_artifacts_complete<A: PhaseArtifact>(
    phase: &PhaseDefinition,
    artifacts: &[A],
) -> bool {
    let done = completed_types(artifacts);
    phase.required_artifacts.iter().all(|ty| done.contains(ty))
}

/// Required artifact types of `phase` still lacking a completed artifact.
pub fn missing_artifacts<A: PhaseArtifact>(
    phase: &PhaseDefinition,
    artifacts: &[A],
) -> Vec<&'static str> {
    let done = completed_types(artifacts);
    phase.required_artifacts.iter().copied().filter(|ty| !done.contains(ty)).collect()
}

/// Evaluate both gates for leaving `phase`.
///
/// A gate whose setting is off passes.
pub fn gates_pass<A: PhaseArtifact>(
    phase: &PhaseDefinition,
    settings: &WorkflowSettings,
    decision: Option<&TollgateDecision>,
    artifacts: &[A],
) -> bool {
    let tollgate_ok =
        !settings.require_tollgate_approval || decision.is_some_and(TollgateDecision::is_approved);
    let artifacts_ok =
        !settings.mandatory_artifacts || required_artifacts_complete(phase, artifacts);
    tollgate_ok && artifacts_ok
}

/// Rounded percentage of `phase`'s artifact vocabulary with at least one
/// completed artifact.
///
/// Returns 0 when no artifact of the vocabulary is present at all.
pub fn phase_progress<A: PhaseArtifact>(phase: &PhaseDefinition, artifacts: &[A]) -> u32 {
    let vocabulary = phase.artifact_vocabulary();
    if vocabulary.is_empty() {
        return 0;
    }

    let in_vocabulary = |a: &&A| vocabulary.iter().any(|ty| *ty == a.artifact_type());
    let relevant: Vec<&A> = artifacts.iter().filter(in_vocabulary).collect();
    if relevant.is_empty() {
        return 0;
    }

    let done: HashSet<&str> =
        relevant.iter().filter(|a| a.is_completed()).map(|a| a.artifact_type()).collect();
    let pct = done.len() as f64 / vocabulary.len() as f64 * 100.0;
    pct.round() as u32
}
