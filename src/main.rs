//! Tollgate - Lean Six Sigma projects and phase-gated workflows.
//!
//! Keeps improvement projects and their artifacts in a local data directory
//! and walks them through DMAIC or Kaizen phases behind tollgate reviews.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tollgate::core::Config;
use tollgate::project::{
    parse_datetime, Artifact, ArtifactPatch, ArtifactStatus, NewArtifact, NewProject, Project,
    ProjectPatch, ProjectStatus,
};
use tollgate::session::{SessionFilter, SessionStatus, WizardSession};
use tollgate::workflow::{PhaseDefinition, TollgateDecision, WorkflowSettingsPatch, WorkflowType};
use tollgate::App;

/// Lean Six Sigma project and tollgate workflow tracker
#[derive(Parser)]
#[command(name = "tollgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the persisted documents
    #[arg(long, global = true, env = "TOLLGATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Configuration file to use instead of the default locations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Project {
        #[command(subcommand)]
        operation: ProjectOperation,
    },

    /// Manage artifacts of the selected project
    Artifact {
        #[command(subcommand)]
        operation: ArtifactOperation,
    },

    /// Drive the methodology workflow
    Workflow {
        #[command(subcommand)]
        operation: WorkflowOperation,
    },

    /// Inspect saved wizard sessions
    Session {
        #[command(subcommand)]
        operation: SessionOperation,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ProjectOperation {
    /// Create a project and select it
    Create {
        /// Project name
        name: String,

        #[command(flatten)]
        fields: ProjectFields,
    },

    /// List projects
    List {
        /// Only projects with this status
        #[arg(long)]
        status: Option<ProjectStatus>,

        /// Only projects in this phase
        #[arg(long)]
        phase: Option<String>,
    },

    /// Show a project (the selected one by default)
    Show {
        /// Project id
        id: Option<String>,
    },

    /// Update fields of a project
    Update {
        /// Project id
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// Clear optional fields (comma separated)
        #[arg(long, value_enum, value_delimiter = ',')]
        clear: Vec<ClearField>,

        #[command(flatten)]
        fields: ProjectFields,
    },

    /// Delete a project
    Delete {
        /// Project id
        id: String,
    },

    /// Select the project artifact and workflow commands work on
    Select {
        /// Project id
        id: String,
    },

    /// Show aggregate project metrics
    Metrics,

    /// Show the most recently updated artifacts across projects
    Recent {
        /// Number of artifacts to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(clap::Args)]
struct ProjectFields {
    /// Description
    #[arg(short, long)]
    description: Option<String>,

    /// Team members (comma separated)
    #[arg(long, value_delimiter = ',')]
    team: Option<Vec<String>>,

    /// Status (active, completed, on_hold, ...)
    #[arg(long)]
    status: Option<ProjectStatus>,

    /// Current phase id
    #[arg(long)]
    phase: Option<String>,

    /// Completion percentage
    #[arg(long, value_parser = parse_number)]
    progress: Option<f64>,

    /// Realized savings
    #[arg(long, value_parser = parse_number)]
    savings: Option<f64>,

    /// Methodology (dmaic, kaizen)
    #[arg(long)]
    workflow: Option<WorkflowType>,

    /// Start date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    start: Option<DateTime<Utc>>,

    /// End date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_parser = parse_date)]
    end: Option<DateTime<Utc>>,
}

/// Optional project fields `project update --clear` can unset.
#[derive(Clone, Copy, clap::ValueEnum)]
enum ClearField {
    Description,
    Workflow,
    Start,
    End,
}

impl ProjectFields {
    fn into_patch(self, name: Option<String>, clear: &[ClearField]) -> ProjectPatch {
        let mut patch = ProjectPatch {
            name,
            description: self.description.map(Some),
            team: self.team,
            status: self.status,
            current_phase: self.phase,
            progress: self.progress,
            savings: self.savings,
            workflow_type: self.workflow.map(Some),
            start_date: self.start.map(Some),
            end_date: self.end.map(Some),
            ..ProjectPatch::default()
        };
        for field in clear {
            match field {
                ClearField::Description => patch.description = Some(None),
                ClearField::Workflow => patch.workflow_type = Some(None),
                ClearField::Start => patch.start_date = Some(None),
                ClearField::End => patch.end_date = Some(None),
            }
        }
        patch
    }

    fn into_new(self, name: String) -> NewProject {
        NewProject {
            name,
            description: self.description,
            team: self.team.unwrap_or_default(),
            status: self.status,
            current_phase: self.phase,
            progress: self.progress,
            savings: self.savings,
            workflow_type: self.workflow,
            start_date: self.start,
            end_date: self.end,
            ..NewProject::default()
        }
    }
}

#[derive(Subcommand)]
enum ArtifactOperation {
    /// Add an artifact
    Add {
        /// Artifact type, e.g. sipoc
        artifact_type: String,

        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// Status (draft, in_progress, completed, ...)
        #[arg(long)]
        status: Option<ArtifactStatus>,

        /// Artifact body as JSON
        #[arg(long, value_parser = parse_json)]
        data: Option<Value>,

        /// Work on this project instead of the selected one
        #[arg(long)]
        project: Option<String>,
    },

    /// Update an artifact
    Update {
        /// Artifact id
        id: String,

        /// New artifact type
        #[arg(long = "type")]
        artifact_type: Option<String>,

        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New status
        #[arg(long)]
        status: Option<ArtifactStatus>,

        /// New body as JSON
        #[arg(long, value_parser = parse_json)]
        data: Option<Value>,

        /// Work on this project instead of the selected one
        #[arg(long)]
        project: Option<String>,
    },

    /// Delete an artifact
    Delete {
        /// Artifact id
        id: String,

        /// Work on this project instead of the selected one
        #[arg(long)]
        project: Option<String>,
    },

    /// List artifacts
    List {
        /// Work on this project instead of the selected one
        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Subcommand)]
enum WorkflowOperation {
    /// Select a methodology (dmaic, kaizen)
    Set {
        /// Methodology key
        workflow: String,
    },

    /// Jump to a phase of the active methodology
    Phase {
        /// Phase id
        phase: String,
    },

    /// Show where the workflow stands
    Status,

    /// Show the next phase and whether it can be entered
    Next,

    /// Advance to the next phase if the gates pass
    Advance,

    /// Show or record phase progress
    Progress {
        /// Record this percentage instead of computing it
        #[arg(long, value_parser = parse_number)]
        set: Option<f64>,

        /// Phase to record for (defaults to the active phase)
        #[arg(long)]
        phase: Option<String>,
    },

    /// Approve a tollgate
    Approve {
        /// Reviewer
        #[arg(long = "by")]
        approved_by: String,

        /// Phase id (defaults to the active phase)
        #[arg(long)]
        phase: Option<String>,

        /// Review comments
        #[arg(long, default_value = "")]
        comments: String,
    },

    /// Reject a tollgate
    Reject {
        /// Reviewer
        #[arg(long = "by")]
        rejected_by: String,

        /// Phase id (defaults to the active phase)
        #[arg(long)]
        phase: Option<String>,

        /// Review comments
        #[arg(long, default_value = "")]
        comments: String,

        /// Action required before the next review (repeatable)
        #[arg(long = "action")]
        required_actions: Vec<String>,
    },

    /// Show or change workflow settings
    Settings {
        /// Require an approved tollgate to leave a phase
        #[arg(long)]
        require_tollgate_approval: Option<bool>,

        /// Advance automatically (stored only)
        #[arg(long)]
        auto_advance_phases: Option<bool>,

        /// Require completed artifacts to leave a phase
        #[arg(long)]
        mandatory_artifacts: Option<bool>,
    },

    /// Clear methodology, phase, progress and decisions
    Reset,

    /// Show workflow statistics over all projects
    Stats,

    /// List the phases of a methodology
    Phases {
        /// Methodology (defaults to the active one, or all)
        workflow: Option<WorkflowType>,
    },
}

#[derive(Subcommand)]
enum SessionOperation {
    /// List saved sessions, most recent first
    List {
        /// Only sessions with this status (in_progress, completed)
        #[arg(long)]
        status: Option<SessionStatus>,
    },

    /// Show a session
    Show {
        /// Session id
        id: String,
    },

    /// Delete a session
    Delete {
        /// Session id
        id: String,
    },

    /// Mark a session completed
    Complete {
        /// Session id
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    // Logs go to stderr so `--format json` output stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let json = cli.format == "json";
    let config_path = cli.config.as_deref();
    let data_dir = cli.data_dir.clone();

    match cli.command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
        Commands::Config { path } => cmd_config(config_path, data_dir, path, json),
        Commands::Project { operation } => {
            with_app(config_path, data_dir, |app| cmd_project(app, operation, json))
        }
        Commands::Artifact { operation } => {
            with_app(config_path, data_dir, |app| cmd_artifact(app, operation, json))
        }
        Commands::Workflow { operation } => {
            with_app(config_path, data_dir, |app| cmd_workflow(app, operation, json))
        }
        Commands::Session { operation } => {
            with_app(config_path, data_dir, |app| cmd_session(app, operation, json))
        }
    }
}

// --- Plumbing ---

fn parse_date(input: &str) -> Result<DateTime<Utc>, String> {
    parse_datetime(input)
        .ok_or_else(|| format!("invalid date '{input}' (expected YYYY-MM-DD or RFC 3339)"))
}

fn parse_number(input: &str) -> Result<f64, String> {
    let value: f64 = input.parse().map_err(|_| format!("invalid number '{input}'"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{input}' is not a finite number"))
    }
}

fn parse_json(input: &str) -> Result<Value, String> {
    serde_json::from_str(input).map_err(|e| format!("invalid JSON: {e}"))
}

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load()?,
    };
    if data_dir.is_some() {
        config.storage.data_dir = data_dir;
    }
    Ok(config)
}

/// Open the app, run `run` and carry the session over to the next run.
fn with_app(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    run: impl FnOnce(&mut App) -> Result<()>,
) -> Result<()> {
    let config = load_config(config_path, data_dir)?;
    let mut app = App::open(&config)?;

    // An unreadable document is reported but does not block the command
    if let Some(error) = app.error().map(str::to_string) {
        tracing::warn!(%error, "continuing without stored data");
        eprintln!("Warning: {error}");
        app.projects.clear_error();
        app.workflow.clear_error();
    }

    let result = run(&mut app);
    app.save_session().context("Failed to save workflow session")?;
    result
}

/// Turn an error recorded by a store into a command failure.
fn check(app: &App) -> Result<()> {
    match app.error() {
        Some(error) => anyhow::bail!("{error}"),
        None => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run `run` against `project` (or the selected project), restoring the
/// previous selection afterwards.
fn on_project<T>(
    app: &mut App,
    project: Option<&str>,
    run: impl FnOnce(&mut App) -> Result<T>,
) -> Result<T> {
    let Some(id) = project else {
        if app.projects.current_project().is_none() {
            anyhow::bail!("No project selected. Use `tollgate project select <ID>` or --project");
        }
        return run(app);
    };

    let previous = app.projects.current_project().map(|p| p.id.clone());
    app.select_project(id);
    check(app)?;
    let result = run(app);

    let restored = previous.and_then(|id| app.projects.project(&id).cloned());
    app.projects.set_current_project(restored);
    result
}

// --- Projects ---

fn cmd_project(app: &mut App, operation: ProjectOperation, json: bool) -> Result<()> {
    match operation {
        ProjectOperation::Create { name, fields } => {
            let project = app.projects.create_project(fields.into_new(name));
            check(app)?;
            if let Some(project) = project {
                if json {
                    print_json(&project)?;
                } else {
                    println!("Created project {} ({})", project.name, project.id);
                }
            }
        }
        ProjectOperation::List { status, phase } => {
            let projects: Vec<&Project> = app
                .projects
                .projects()
                .iter()
                .filter(|p| status.as_ref().map_or(true, |s| &p.status == s))
                .filter(|p| phase.as_deref().map_or(true, |ph| p.current_phase == ph))
                .collect();

            if json {
                print_json(&projects)?;
            } else {
                let selected = app.projects.current_project().map(|p| p.id.as_str());
                for project in &projects {
                    let marker = if Some(project.id.as_str()) == selected { "*" } else { " " };
                    println!(
                        "{marker} {}  {}  [{}]  phase: {}",
                        project.id, project.name, project.status, project.current_phase
                    );
                }
                println!("\nTotal: {} projects", projects.len());
            }
        }
        ProjectOperation::Show { id } => {
            let project = match id {
                Some(id) => app.projects.project(&id).cloned(),
                None => app.projects.current_project().cloned(),
            };
            let Some(project) = project else {
                anyhow::bail!("Project not found");
            };
            if json {
                print_json(&project)?;
            } else {
                print_project(&project);
            }
        }
        ProjectOperation::Update { id, name, clear, fields } => {
            let patch = fields.into_patch(name, &clear);
            if patch.is_empty() {
                anyhow::bail!("Nothing to update");
            }
            let project = app.projects.update_project(&id, patch);
            check(app)?;
            if let Some(project) = project {
                if json {
                    print_json(&project)?;
                } else {
                    println!("Updated project {} ({})", project.name, project.id);
                }
            }
        }
        ProjectOperation::Delete { id } => {
            app.projects.delete_project(&id);
            check(app)?;
            if json {
                print_json(&json!({ "deleted": id }))?;
            } else {
                println!("Deleted project {id}");
            }
        }
        ProjectOperation::Select { id } => {
            let project = app.select_project(&id);
            check(app)?;
            if let Some(project) = project {
                if json {
                    print_json(&project)?;
                } else {
                    println!("Selected project {} ({})", project.name, project.id);
                }
            }
        }
        ProjectOperation::Metrics => {
            let metrics = app.projects.metrics();
            if json {
                print_json(metrics)?;
            } else {
                println!("Active projects:    {}", metrics.active_projects);
                println!("Completed projects: {}", metrics.completed_projects);
                println!("Total savings:      {:.2}", metrics.total_savings);
                println!("Avg cycle time:     {} days", metrics.avg_cycle_time);
            }
        }
        ProjectOperation::Recent { limit } => {
            let limit = limit.unwrap_or(app.config.display.recent_limit);
            let recent = app.projects.recent_artifacts(limit);
            if json {
                print_json(&recent)?;
            } else {
                for entry in &recent {
                    println!(
                        "{}  {}  [{}]  {}  ({})",
                        entry.artifact.updated_at.format("%Y-%m-%d %H:%M"),
                        entry.artifact.artifact_type,
                        entry.artifact.status,
                        entry.project_name,
                        entry.artifact.id
                    );
                }
            }
        }
    }
    Ok(())
}

fn print_project(project: &Project) {
    println!("{} ({})", project.name, project.id);
    if let Some(description) = &project.description {
        println!("  {description}");
    }
    println!("  Status:   {}", project.status);
    println!("  Phase:    {}", project.current_phase);
    if let Some(workflow) = project.workflow_type {
        println!("  Workflow: {}", workflow.display_name());
    }
    println!("  Progress: {}%", project.progress);
    println!("  Savings:  {:.2}", project.savings);
    if !project.team.is_empty() {
        println!("  Team:     {}", project.team.join(", "));
    }
    if let Some(start) = project.start_date {
        println!("  Started:  {}", start.format("%Y-%m-%d"));
    }
    if let Some(end) = project.end_date {
        println!("  Ended:    {}", end.format("%Y-%m-%d"));
    }
    println!("  Artifacts: {}", project.artifacts.len());
    for artifact in &project.artifacts {
        print_artifact(artifact);
    }
}

// --- Artifacts ---

fn print_artifact(artifact: &Artifact) {
    let name = artifact.name.as_deref().unwrap_or("");
    println!("    {}  {}  [{}]  {name}", artifact.id, artifact.artifact_type, artifact.status);
}

fn cmd_artifact(app: &mut App, operation: ArtifactOperation, json: bool) -> Result<()> {
    match operation {
        ArtifactOperation::Add { artifact_type, name, status, data, project } => {
            let input = NewArtifact {
                artifact_type,
                name,
                status,
                data: data.unwrap_or(Value::Null),
            };
            let artifact = on_project(app, project.as_deref(), |app| {
                let artifact = app.projects.add_artifact(input);
                check(app)?;
                Ok(artifact)
            })?;
            if let Some(artifact) = artifact {
                if json {
                    print_json(&artifact)?;
                } else {
                    println!("Added {} artifact ({})", artifact.artifact_type, artifact.id);
                }
            }
        }
        ArtifactOperation::Update { id, artifact_type, name, status, data, project } => {
            let patch = ArtifactPatch { artifact_type, name, status, data };
            let artifact = on_project(app, project.as_deref(), |app| {
                let artifact = app.projects.update_artifact(&id, patch);
                check(app)?;
                Ok(artifact)
            })?;
            if let Some(artifact) = artifact {
                if json {
                    print_json(&artifact)?;
                } else {
                    println!("Updated {} artifact ({})", artifact.artifact_type, artifact.id);
                }
            }
        }
        ArtifactOperation::Delete { id, project } => {
            on_project(app, project.as_deref(), |app| {
                app.projects.delete_artifact(&id);
                check(app)
            })?;
            if json {
                print_json(&json!({ "deleted": id }))?;
            } else {
                println!("Deleted artifact {id}");
            }
        }
        ArtifactOperation::List { project } => {
            let artifacts = on_project(app, project.as_deref(), |app| {
                Ok(app.current_artifacts().to_vec())
            })?;
            if json {
                print_json(&artifacts)?;
            } else {
                for artifact in &artifacts {
                    print_artifact(artifact);
                }
                println!("\nTotal: {} artifacts", artifacts.len());
            }
        }
    }
    Ok(())
}

// --- Workflow ---

fn active_phase(app: &App, phase: Option<String>) -> Result<String> {
    match phase.or_else(|| app.workflow.current_phase().map(str::to_string)) {
        Some(phase) => Ok(phase),
        None => anyhow::bail!("No active phase. Use `tollgate workflow set <dmaic|kaizen>` first"),
    }
}

fn describe_decision(decision: Option<&TollgateDecision>) -> String {
    match decision {
        None => "pending".to_string(),
        Some(TollgateDecision::Approved { approved_by, approved_at, .. }) => {
            format!("approved by {approved_by} on {}", approved_at.format("%Y-%m-%d"))
        }
        Some(TollgateDecision::Rejected { rejected_by, rejected_at, required_actions, .. }) => {
            let mut text =
                format!("rejected by {rejected_by} on {}", rejected_at.format("%Y-%m-%d"));
            if !required_actions.is_empty() {
                text.push_str(&format!(" (required: {})", required_actions.join("; ")));
            }
            text
        }
    }
}

fn print_phases(workflow: WorkflowType, current: Option<&str>) {
    println!("{}", workflow.display_name());
    for (index, phase) in workflow.phases().iter().enumerate() {
        let marker = if Some(phase.id) == current { "*" } else { " " };
        println!("{marker} {}. {} ({}) - {}", index + 1, phase.name, phase.id, phase.description);
        println!("     required: {}", phase.required_artifacts.join(", "));
        println!("     optional: {}", phase.optional_artifacts.join(", "));
    }
}

fn phase_json(phase: &PhaseDefinition) -> Value {
    json!(phase)
}

fn position_json(app: &App) -> Value {
    json!({
        "currentWorkflow": app.workflow.current_workflow(),
        "currentPhase": app.workflow.current_phase_data().map(phase_json),
    })
}

fn cmd_workflow(app: &mut App, operation: WorkflowOperation, json: bool) -> Result<()> {
    match operation {
        WorkflowOperation::Set { workflow } => {
            app.set_workflow(&workflow);
            check(app)?;
            if json {
                print_json(&position_json(app))?;
            } else if let Some(phase) = app.workflow.current_phase_data() {
                println!("Workflow set to {workflow}, starting at {}", phase.name);
            }
        }
        WorkflowOperation::Phase { phase } => {
            app.set_phase(&phase);
            check(app)?;
            if json {
                print_json(&position_json(app))?;
            } else {
                println!("Moved to phase {phase}");
            }
        }
        WorkflowOperation::Status => {
            let Some(workflow) = app.workflow.current_workflow() else {
                if json {
                    print_json(&json!({ "currentWorkflow": null }))?;
                } else {
                    println!("No workflow selected");
                }
                return Ok(());
            };
            let phase = app.workflow.current_phase_data();
            let artifacts = app.current_artifacts();
            let decision = phase.and_then(|p| app.workflow.tollgate_approvals().get(p.id));
            let progress = app.workflow.calculate_phase_progress(artifacts);
            let missing = app.workflow.missing_artifacts(artifacts);
            let can_advance = app.workflow.can_advance_to_next_phase(artifacts);

            if json {
                print_json(&json!({
                    "currentWorkflow": workflow,
                    "currentPhase": phase.map(phase_json),
                    "progress": progress,
                    "tollgate": decision,
                    "missingArtifacts": missing,
                    "canAdvance": can_advance,
                    "settings": app.workflow.workflow_settings(),
                }))?;
            } else {
                println!("Workflow:  {}", workflow.display_name());
                if let Some(phase) = phase {
                    let index = workflow.phase_index(phase.id).map_or(0, |i| i + 1);
                    let total = workflow.phases().len();
                    println!("Phase:     {} ({}) [{index}/{total}]", phase.name, phase.id);
                }
                if let Some(project) = app.projects.current_project() {
                    println!("Project:   {} ({})", project.name, project.id);
                }
                println!("Progress:  {progress}%");
                println!("Tollgate:  {}", describe_decision(decision));
                if !missing.is_empty() {
                    println!("Missing:   {}", missing.join(", "));
                }
                println!("Advance:   {}", if can_advance { "ready" } else { "blocked" });
            }
        }
        WorkflowOperation::Next => {
            let next = app.workflow.next_phase();
            let can_advance = app.workflow.can_advance_to_next_phase(app.current_artifacts());
            if json {
                print_json(&json!({
                    "nextPhase": next.map(phase_json),
                    "canAdvance": can_advance && next.is_some(),
                }))?;
            } else {
                match next {
                    Some(phase) => {
                        let state = if can_advance { "ready" } else { "blocked" };
                        println!("Next phase: {} ({}) - {state}", phase.name, phase.id);
                        for requirement in phase.tollgate_requirements {
                            println!("  - {requirement}");
                        }
                    }
                    None => println!("No next phase"),
                }
            }
        }
        WorkflowOperation::Advance => {
            let next = app.advance_phase();
            check(app)?;
            if json {
                print_json(&position_json(app))?;
            } else if let Some(phase) = next {
                println!("Advanced to {} ({})", phase.name, phase.id);
            }
        }
        WorkflowOperation::Progress { set, phase } => match set {
            Some(progress) => {
                let phase = active_phase(app, phase)?;
                app.workflow.update_phase_progress(&phase, progress);
                check(app)?;
                if json {
                    print_json(&json!({
                        "phase": phase,
                        "recorded": app.workflow.phase_progress(),
                    }))?;
                } else {
                    println!("Recorded {progress}% for {phase}");
                }
            }
            None => {
                let computed = app.workflow.calculate_phase_progress(app.current_artifacts());
                if json {
                    print_json(&json!({
                        "calculated": computed,
                        "recorded": app.workflow.phase_progress(),
                    }))?;
                } else {
                    println!("Calculated: {computed}%");
                    for (phase, progress) in app.workflow.phase_progress() {
                        println!("  {phase}: {progress}%");
                    }
                }
            }
        },
        WorkflowOperation::Approve { approved_by, phase, comments } => {
            let phase = active_phase(app, phase)?;
            app.workflow.approve_tollgate(&phase, &approved_by, &comments);
            if json {
                print_json(&app.workflow.tollgate_approvals().get(&phase))?;
            } else {
                println!("Approved tollgate for {phase}");
            }
        }
        WorkflowOperation::Reject { rejected_by, phase, comments, required_actions } => {
            let phase = active_phase(app, phase)?;
            app.workflow.reject_tollgate(&phase, &rejected_by, &comments, required_actions);
            if json {
                print_json(&app.workflow.tollgate_approvals().get(&phase))?;
            } else {
                println!("Rejected tollgate for {phase}");
            }
        }
        WorkflowOperation::Settings {
            require_tollgate_approval,
            auto_advance_phases,
            mandatory_artifacts,
        } => {
            let patch = WorkflowSettingsPatch {
                require_tollgate_approval,
                auto_advance_phases,
                mandatory_artifacts,
            };
            if !patch.is_empty() {
                app.workflow.update_workflow_settings(patch);
                check(app)?;
            }
            let settings = app.workflow.workflow_settings();
            if json {
                print_json(settings)?;
            } else {
                println!("require_tollgate_approval = {}", settings.require_tollgate_approval);
                println!("auto_advance_phases = {}", settings.auto_advance_phases);
                println!("mandatory_artifacts = {}", settings.mandatory_artifacts);
            }
        }
        WorkflowOperation::Reset => {
            app.workflow.reset_workflow();
            if json {
                print_json(&app.workflow.snapshot_session())?;
            } else {
                println!("Workflow reset");
            }
        }
        WorkflowOperation::Stats => {
            let stats = app.workflow.workflow_stats(app.projects.projects());
            if json {
                print_json(&stats)?;
            } else {
                println!("DMAIC projects:  {}", stats.dmaic_projects);
                println!("Kaizen projects: {}", stats.kaizen_projects);
                println!("Tollgate approval rate: {}%", stats.tollgate_approval_rate);
                println!("Projects per phase:");
                for count in &stats.phase_distribution {
                    println!("  {:<10} {}", count.phase, count.projects);
                }
            }
        }
        WorkflowOperation::Phases { workflow } => {
            let current = app.workflow.current_workflow();
            let selected: Vec<WorkflowType> = match workflow.or(current) {
                Some(workflow) => vec![workflow],
                None => WorkflowType::ALL.to_vec(),
            };
            if json {
                let phases: Vec<Value> = selected
                    .iter()
                    .map(|w| json!({ "workflow": w, "phases": w.phases() }))
                    .collect();
                print_json(&phases)?;
            } else {
                let active = app.workflow.current_phase();
                for workflow in selected {
                    let marker = if Some(workflow) == current { active } else { None };
                    print_phases(workflow, marker);
                }
            }
        }
    }
    Ok(())
}

// --- Sessions ---

fn print_session(session: &WizardSession) {
    let when =
        session.timestamp.map(|t| t.format("%Y-%m-%d %H:%M").to_string()).unwrap_or_default();
    println!(
        "{}  {}  [{}]  {}  {when}",
        session.session_id, session.name, session.status, session.document_type
    );
}

fn cmd_session(app: &mut App, operation: SessionOperation, json: bool) -> Result<()> {
    match operation {
        SessionOperation::List { status } => {
            let filter = status.map_or(SessionFilter::All, SessionFilter::Status);
            let sessions = app.sessions.list(filter)?;
            if json {
                print_json(&sessions)?;
            } else {
                for session in &sessions {
                    print_session(session);
                }
                println!("\nTotal: {} sessions", sessions.len());
            }
        }
        SessionOperation::Show { id } => {
            let Some(session) = app.sessions.load(&id)? else {
                anyhow::bail!("Session not found");
            };
            if json {
                print_json(&session)?;
            } else {
                print_session(&session);
                println!("  Step: {}", session.current_phase);
                for (step, note) in &session.notes {
                    if !note.is_empty() {
                        println!("  {step}: {note}");
                    }
                }
                for message in &session.chat_history {
                    println!("  [{}] {}", message.kind, message.content);
                }
            }
        }
        SessionOperation::Delete { id } => {
            if !app.sessions.delete(&id)? {
                anyhow::bail!("Session not found");
            }
            if json {
                print_json(&json!({ "deleted": id }))?;
            } else {
                println!("Deleted session {id}");
            }
        }
        SessionOperation::Complete { id } => {
            let Some(session) = app.sessions.mark_completed(&id)? else {
                anyhow::bail!("Session not found");
            };
            if json {
                print_json(&session)?;
            } else {
                println!("Completed session {id}");
            }
        }
    }
    Ok(())
}

// --- Misc ---

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "tollgate", &mut io::stdout());
}

/// Show configuration.
fn cmd_config(
    config_path: Option<&Path>,
    data_dir: Option<PathBuf>,
    show_path: bool,
    json: bool,
) -> Result<()> {
    if show_path {
        let path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Config::config_dir().map(|dir| dir.join("config.toml")),
        };
        if json {
            print_json(&json!({ "path": path }))?;
        } else if let Some(path) = path {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = load_config(config_path, data_dir)?;
    let data_dir = config.data_dir()?;
    if json {
        print_json(&json!({ "config": config, "dataDir": data_dir }))?;
    } else {
        println!("{}", toml::to_string_pretty(&config)?);
        println!("# data directory: {}", data_dir.display());
    }

    Ok(())
}
