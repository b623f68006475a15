//! Data model for the kinsight evidence-integration pipeline.
//!
//! Every artifact the pipeline produces is a plain serde type defined here:
//! the interview summary, per-video analyses, versioned integration analyses,
//! clarification questions and answers, and the confidence ledger. Artifacts
//! are immutable once written; later stages supersede them with new versions
//! rather than editing in place, so structural equality and lossless JSON
//! round-trips are part of the contract (and tested).

mod artifacts;
mod clarification;
mod error;
mod event;
mod ids;
mod integration;
mod stage;

pub use artifacts::{
    CoverageVerdict, Domain, Frequency, IndividualVideoAnalysis, InterviewSummary, Observation,
    ObservationContext, Polarity, ReportedConcern, VideoGuideline,
};
pub use clarification::{
    AnswerType, ClarificationAnswer, ClarificationQuestion, ConfidenceLedger, LedgerEntry,
    Priority, QuestionCategory,
};
pub use error::{ExitCode, KinsightError};
pub use event::StageEvent;
pub use ids::{ArtifactId, ArtifactKind, CaseId, CaseIdError, GuidelineId, QuestionId};
pub use integration::{
    Confidence, Coverage, DiscrepancyRecord, GateVerdict, IntegrationAnalysis, Pattern,
    Pervasiveness, ResolutionState, StrengthChallengeBalance,
};
pub use stage::Stage;
