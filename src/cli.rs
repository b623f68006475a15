//! Command-line interface for driving cases through the pipeline.
//!
//! Each subcommand maps to one orchestrator operation. Exit codes are
//! stable: 0 success, 1 generic, 2 usage, 3 invalid transition, 4 malformed
//! submission, 5 stale artifact, 70 oracle failure.

use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;

use kinsight_model::{
    ArtifactKind, CaseId, ExitCode, InterviewSummary, KinsightError, Stage, StageEvent,
};

use crate::config::Config;
use crate::orchestrator::{AnswerSubmission, StageOrchestrator};
use crate::store::CaseStore;

/// kinsight - evidence integration pipeline for developmental assessment
#[derive(Parser)]
#[command(name = "kinsight")]
#[command(about = "Integrates interview and video evidence into a gated assessment analysis")]
#[command(long_about = r#"
kinsight drives an assessment case through interview intake, per-video
analysis, cross-context integration, one clarification round with the
parent, and a sufficiency gate that decides whether the analysis is ready
for reporting.

EXAMPLES:
  # Create a case and record the interview summary
  kinsight init case-0142 --child-ref anon-7f3a
  kinsight interview case-0142 --file interview.json

  # Submit a video against one of the filming guidelines
  kinsight video case-0142 --guideline g-mealtime --file mealtime.json

  # Or a batch: videos in one batch are analyzed concurrently
  kinsight video case-0142 --guideline g-home --file home.json \
                           --guideline g-mealtime --file mealtime.json

  # Integrate once the parent is done filming
  kinsight no-more-videos case-0142
  kinsight integrate case-0142

  # Answer (or decline) the clarification round
  kinsight answers case-0142 --file answers.json
  kinsight proceed case-0142

  # Hand the finished analysis to the report stage
  kinsight handoff case-0142

CONFIGURATION:
  kinsight.toml in the working directory, overridden by --config and
  --store-root. The Oracle API key is read from KINSIGHT_API_KEY only.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Root directory for case storage (overrides config)
    #[arg(long, global = true)]
    pub store_root: Option<Utf8PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new case awaiting its interview summary
    Init {
        /// Case identifier (lowercase letters, digits, hyphens)
        case_id: String,
        /// Opaque reference to the child; no personal data
        #[arg(long)]
        child_ref: String,
    },
    /// Show case stage and artifact index
    Status {
        case_id: String,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Record the structured interview summary
    Interview {
        case_id: String,
        /// JSON file holding the interview summary
        #[arg(long)]
        file: Utf8PathBuf,
    },
    /// Analyze one or more submitted videos against filming guidelines
    Video {
        case_id: String,
        /// Guideline the video responds to; repeat for a batch
        #[arg(long = "guideline", required = true)]
        guideline: Vec<String>,
        /// JSON file holding the evidence references for the video; one per
        /// `--guideline`, in the same order
        #[arg(long = "file", required = true)]
        file: Vec<Utf8PathBuf>,
    },
    /// Declare that no further videos are coming
    NoMoreVideos { case_id: String },
    /// Run integration and the sufficiency gate
    Integrate { case_id: String },
    /// Submit a batch of parent answers to the open clarification round
    Answers {
        case_id: String,
        /// JSON file holding an array of answer submissions
        #[arg(long)]
        file: Utf8PathBuf,
    },
    /// Close the clarification round without the remaining answers
    Proceed { case_id: String },
    /// Print the report handoff package for a ready case
    Handoff { case_id: String },
}

/// Machine-readable status output.
#[derive(Debug, Serialize)]
struct CaseStatus {
    schema_version: String,
    case_id: CaseId,
    current_stage: Stage,
    action_required: bool,
    rounds_done: u32,
    artifacts: Vec<ArtifactStatus>,
}

#[derive(Debug, Serialize)]
struct ArtifactStatus {
    id: String,
    kind: ArtifactKind,
    created_at: chrono::DateTime<chrono::Utc>,
    blake3_first8: String,
}

impl CaseStatus {
    const SCHEMA_VERSION: &'static str = "case-status.v1";
}

/// Run the parsed CLI, returning the process exit code.
pub async fn run(cli: Cli) -> ExitCode {
    match execute(cli).await {
        Ok(()) => ExitCode::Success,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            err.to_exit_code()
        }
    }
}

async fn execute(cli: Cli) -> Result<(), KinsightError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(root) = cli.store_root {
        config.store_root = root;
    }
    let store = CaseStore::open(config.store_root.clone())?;
    let oracle = config.build_oracle()?;
    let orchestrator = StageOrchestrator::new(store, Arc::clone(&oracle));

    match cli.command {
        Commands::Init { case_id, child_ref } => {
            let (_, events) = orchestrator.create_case(parse_case_id(&case_id)?, &child_ref)?;
            print_events(&events);
        }
        Commands::Status { case_id, json } => {
            let case_id = parse_case_id(&case_id)?;
            let case = orchestrator.store().load_case(&case_id)?;
            let status = CaseStatus {
                schema_version: CaseStatus::SCHEMA_VERSION.to_string(),
                case_id: case.case_id.clone(),
                current_stage: case.current_stage,
                action_required: StageEvent::new(case.case_id.clone(), case.current_stage, "")
                    .action_required,
                rounds_done: case.rounds_done(),
                artifacts: case
                    .artifacts
                    .iter()
                    .map(|a| ArtifactStatus {
                        id: a.id.to_string(),
                        kind: a.kind,
                        created_at: a.created_at,
                        blake3_first8: a.blake3_first8.clone(),
                    })
                    .collect(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("case {}: {}", status.case_id, status.current_stage);
                for artifact in &status.artifacts {
                    println!(
                        "  {}  {}  {}",
                        artifact.id, artifact.blake3_first8, artifact.created_at
                    );
                }
            }
        }
        Commands::Interview { case_id, file } => {
            let summary: InterviewSummary = read_json(&file)?;
            let events = orchestrator.submit_interview(&parse_case_id(&case_id)?, summary)?;
            print_events(&events);
        }
        Commands::Video {
            case_id,
            guideline,
            file,
        } => {
            if guideline.len() != file.len() {
                return Err(KinsightError::MalformedSubmission(format!(
                    "{} --guideline flag(s) but {} --file flag(s); each video needs both",
                    guideline.len(),
                    file.len()
                )));
            }
            let mut videos = Vec::with_capacity(guideline.len());
            for (guideline, path) in guideline.into_iter().zip(&file) {
                let evidence: serde_json::Value = read_json(path)?;
                videos.push((kinsight_model::GuidelineId(guideline), evidence));
            }
            let events = orchestrator
                .submit_videos(&parse_case_id(&case_id)?, videos)
                .await?;
            print_events(&events);
        }
        Commands::NoMoreVideos { case_id } => {
            let events = orchestrator.declare_no_more_videos(&parse_case_id(&case_id)?)?;
            print_events(&events);
        }
        Commands::Integrate { case_id } => {
            let events = orchestrator.integrate(&parse_case_id(&case_id)?).await?;
            print_events(&events);
        }
        Commands::Answers { case_id, file } => {
            let submissions: Vec<AnswerSubmission> = read_json(&file)?;
            let events = orchestrator
                .submit_answers(&parse_case_id(&case_id)?, submissions)
                .await?;
            print_events(&events);
        }
        Commands::Proceed { case_id } => {
            let events = orchestrator
                .proceed_without_answers(&parse_case_id(&case_id)?)
                .await?;
            print_events(&events);
        }
        Commands::Handoff { case_id } => {
            let handoff = orchestrator.report_handoff(&parse_case_id(&case_id)?)?;
            println!("{}", serde_json::to_string_pretty(&handoff)?);
        }
    }
    Ok(())
}

fn parse_case_id(raw: &str) -> Result<CaseId, KinsightError> {
    CaseId::new(raw).map_err(|e| KinsightError::MalformedSubmission(e.to_string()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &camino::Utf8Path) -> Result<T, KinsightError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| KinsightError::Store(format!("cannot read {path}: {e}")))?;
    serde_json::from_str(&text)
        .map_err(|e| KinsightError::MalformedSubmission(format!("invalid JSON in {path}: {e}")))
}

fn print_events(events: &[StageEvent]) {
    for event in events {
        let marker = if event.action_required { "!" } else { " " };
        println!("{marker} [{}] {}", event.new_stage, event.summary);
    }
}
