//! kinsight - evidence integration pipeline for developmental assessment.
//!
//! kinsight drives an assessment case through a fixed sequence of stages:
//! interview intake, guideline-driven video analysis, cross-context pattern
//! integration, one clarification round with the parent, and a sufficiency
//! gate that decides whether the analysis may proceed to reporting.
//!
//! Two design rules shape everything here:
//!
//! - **Artifacts are append-only.** Every stage output is an immutable JSON
//!   file with a schema version and a BLAKE3 hash; later stages supersede
//!   earlier analyses with new versions that reference their predecessor.
//!   The case head (`case.json`) carries only the current stage and the
//!   artifact index.
//! - **The Oracle reasons, the pipeline decides.** All natural-language
//!   work (reading footage, drafting narratives and questions, interpreting
//!   answers) sits behind the schema-gated [`kinsight_oracle::Oracle`]
//!   boundary. Pervasiveness classification, discrepancy resolution rules,
//!   question selection, confidence movement, and the gate verdict are pure
//!   functions in `kinsight-integrate`.
//!
//! # Quick start (CLI)
//!
//! ```bash
//! kinsight init case-0142 --child-ref anon-7f3a
//! kinsight interview case-0142 --file interview.json
//! kinsight video case-0142 --guideline g-mealtime --file mealtime.json
//! kinsight no-more-videos case-0142
//! kinsight integrate case-0142
//! kinsight status case-0142 --json
//! ```
//!
//! # Library use
//!
//! [`orchestrator::StageOrchestrator`] over a [`store::CaseStore`] and any
//! [`kinsight_oracle::Oracle`] implementation is the embedding surface; the
//! CLI is a thin wrapper over it.

pub mod case;
pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod store;

pub use case::{ArtifactRecord, Case};
pub use config::{Config, OracleConfig, OracleProvider};
pub use orchestrator::{AnswerSubmission, QuestionSet, ReportHandoff, StageOrchestrator};
pub use store::CaseStore;

// The domain model and decision components are re-exported so embedders can
// depend on `kinsight` alone.
pub use kinsight_model::{ExitCode, KinsightError, Stage, StageEvent};
