//! Methodology and phase definitions.
//!
//! Both methodologies are fixed: users pick one and move through its
//! phases, they never author phases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Improvement methodology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowType {
    /// Define, Measure, Analyze, Improve, Control
    Dmaic,
    /// Before, During, After
    Kaizen,
}

impl WorkflowType {
    /// All methodologies.
    pub const ALL: [Self; 2] = [Self::Dmaic, Self::Kaizen];

    /// Storage key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dmaic => "dmaic",
            Self::Kaizen => "kaizen",
        }
    }

    /// Display name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Dmaic => "DMAIC",
            Self::Kaizen => "Kaizen",
        }
    }

    /// Ordered phases of this methodology.
    pub fn phases(self) -> &'static [PhaseDefinition] {
        match self {
            Self::Dmaic => DMAIC_PHASES,
            Self::Kaizen => KAIZEN_PHASES,
        }
    }

    /// First phase of this methodology.
    pub fn first_phase(self) -> &'static PhaseDefinition {
        &self.phases()[0]
    }

    /// Look up a phase of this methodology by id.
    pub fn phase(self, id: &str) -> Option<&'static PhaseDefinition> {
        self.phases().iter().find(|p| p.id == id)
    }

    /// Position of a phase within this methodology.
    pub fn phase_index(self, id: &str) -> Option<usize> {
        self.phases().iter().position(|p| p.id == id)
    }
}

impl FromStr for WorkflowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dmaic" => Ok(Self::Dmaic),
            "kaizen" => Ok(Self::Kaizen),
            other => Err(format!("unknown workflow type '{other}' (expected dmaic or kaizen)")),
        }
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static definition of one phase.
#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Artifact types that must be completed to leave the phase
    pub required_artifacts: &'static [&'static str],
    /// Artifact types that count towards progress but do not gate
    pub optional_artifacts: &'static [&'static str],
    /// Human checklist for the tollgate review
    pub tollgate_requirements: &'static [&'static str],
}

impl PhaseDefinition {
    /// Required types followed by optional types, without duplicates.
    pub fn artifact_vocabulary(&self) -> Vec<&'static str> {
        let mut vocabulary: Vec<&'static str> = Vec::new();
        for &ty in self.required_artifacts.iter().chain(self.optional_artifacts) {
            if !vocabulary.contains(&ty) {
                vocabulary.push(ty);
            }
        }
        vocabulary
    }
}

/// Phase list for a methodology.
pub fn phases_for(workflow: WorkflowType) -> &'static [PhaseDefinition] {
    workflow.phases()
}

pub static DMAIC_PHASES: &[PhaseDefinition] = &[
    PhaseDefinition {
        id: "define",
        name: "Define",
        description: "Define the problem, improvement activity, opportunity for improvement, and project goals",
        required_artifacts: &["project_charter", "sipoc", "voice_of_customer"],
        optional_artifacts: &["stakeholder_analysis", "project_planning"],
        tollgate_requirements: &[
            "Problem statement clearly defined",
            "Project scope established",
            "Customer requirements identified",
            "Project charter approved",
        ],
    },
    PhaseDefinition {
        id: "measure",
        name: "Measure",
        description: "Measure the extent of the problem and collect relevant data",
        required_artifacts: &["data_collection_plan", "process_map", "baseline_metrics"],
        optional_artifacts: &["checksheet", "run_chart", "histogram"],
        tollgate_requirements: &[
            "Current state process mapped",
            "Data collection plan established",
            "Baseline performance measured",
            "Measurement system validated",
        ],
    },
    PhaseDefinition {
        id: "analyze",
        name: "Analyze",
        description: "Analyze the data to identify and verify root causes",
        required_artifacts: &["root_cause_analysis", "pareto_chart", "statistical_analysis"],
        optional_artifacts: &["scatter_plot", "correlation_analysis", "hypothesis_testing"],
        tollgate_requirements: &[
            "Root causes identified and verified",
            "Data analysis completed",
            "Improvement opportunities prioritized",
            "Solution hypotheses developed",
        ],
    },
    PhaseDefinition {
        id: "improve",
        name: "Improve",
        description: "Improve the process by implementing solutions",
        required_artifacts: &["solution_selection", "implementation_plan", "pilot_results"],
        optional_artifacts: &["fmea", "cost_benefit_analysis", "change_management"],
        tollgate_requirements: &[
            "Solutions implemented and tested",
            "Improvement results validated",
            "Implementation plan executed",
            "Benefits realized and measured",
        ],
    },
    PhaseDefinition {
        id: "control",
        name: "Control",
        description: "Control the improved process to sustain gains",
        required_artifacts: &["control_plan", "standard_work", "monitoring_system"],
        optional_artifacts: &["control_charts", "training_materials", "handoff_documentation"],
        tollgate_requirements: &[
            "Control plan implemented",
            "Process monitoring established",
            "Standard work documented",
            "Sustainment plan activated",
        ],
    },
];

pub static KAIZEN_PHASES: &[PhaseDefinition] = &[
    PhaseDefinition {
        id: "before",
        name: "Before",
        description: "Current state analysis and preparation",
        required_artifacts: &["current_state_analysis", "kaizen_charter", "team_formation"],
        optional_artifacts: &["baseline_metrics", "stakeholder_analysis"],
        tollgate_requirements: &[
            "Current state documented",
            "Improvement opportunity identified",
            "Team assembled and trained",
            "Event scope defined",
        ],
    },
    PhaseDefinition {
        id: "during",
        name: "During",
        description: "Kaizen event execution and improvement implementation",
        required_artifacts: &["future_state_design", "implementation_actions", "quick_wins"],
        optional_artifacts: &["value_stream_map", "waste_identification", "solution_testing"],
        tollgate_requirements: &[
            "Future state designed",
            "Improvements implemented",
            "Results measured",
            "Team consensus achieved",
        ],
    },
    PhaseDefinition {
        id: "after",
        name: "After",
        description: "Sustainment and continuous improvement",
        required_artifacts: &["sustainment_plan", "results_summary", "lessons_learned"],
        optional_artifacts: &["training_plan", "follow_up_actions", "celebration"],
        tollgate_requirements: &[
            "Results sustained",
            "Standard work established",
            "Team recognition completed",
            "Next steps identified",
        ],
    },
];
