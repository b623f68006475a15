//! Deterministic decision components of the kinsight pipeline.
//!
//! Everything in this crate is a pure function over artifact data: given the
//! same inputs, the same patterns, discrepancy records, question selections,
//! confidence levels, and gate verdicts come out. The Oracle reads footage
//! and drafts prose; it never classifies pervasiveness, never resolves a
//! record on its own authority, and never decides sufficiency.

mod clarify;
mod confidence;
mod discrepancy;
mod gate;
mod pattern;

pub use clarify::{Candidate, select_questions};
pub use confidence::{RoundSignals, downgrade_for_contradicted_pervasive, update_confidence};
pub use discrepancy::{
    AnswerInterpretation, ProposedResolution, resolve_discrepancies, resolve_with_answers,
};
pub use gate::gate;
pub use pattern::{balance, confirm_pervasive_from_answers, integrate_patterns, pervasiveness_gaps};
