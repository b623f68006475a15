//! The sufficiency gate: decides whether the case proceeds to reporting or
//! loops back for more evidence.

use kinsight_model::{Confidence, Coverage, GateVerdict};
use tracing::info;

/// Evaluate the gate decision table.
///
/// | coverage | unresolved | confidence | rounds_done | verdict |
/// |----------|------------|------------|-------------|---------|
/// | partial  | any        | any        | any         | `AwaitingMoreVideo` |
/// | full     | 0          | any        | any         | `ReportReady` |
/// | full     | >0         | high       | ≥1          | `ReportReady` (unresolved surfaced as limitations) |
/// | full     | >0         | any        | 0           | `ClarificationPending` |
/// | full     | >0         | low/mod    | ≥1          | `AwaitingMoreClarification` |
///
/// Clarification is a single round per case: after one round the gate must
/// escalate explicitly rather than loop silently. Insufficient evidence is a
/// verdict here, never an error.
#[must_use]
pub fn gate(
    coverage: Coverage,
    unresolved: usize,
    confidence: Confidence,
    rounds_done: u32,
) -> GateVerdict {
    let verdict = match (coverage, unresolved, confidence, rounds_done) {
        (Coverage::Partial, ..) => GateVerdict::AwaitingMoreVideo,
        (Coverage::Full, 0, ..) => GateVerdict::ReportReady,
        (Coverage::Full, _, Confidence::High, r) if r >= 1 => GateVerdict::ReportReady,
        (Coverage::Full, _, _, 0) => GateVerdict::ClarificationPending,
        (Coverage::Full, ..) => GateVerdict::AwaitingMoreClarification,
    };
    info!(
        coverage = ?coverage,
        unresolved,
        confidence = ?confidence,
        rounds_done,
        verdict = ?verdict,
        "sufficiency gate"
    );
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_coverage_always_requests_video() {
        for confidence in [Confidence::Low, Confidence::Moderate, Confidence::High] {
            for rounds in [0, 1] {
                assert_eq!(
                    gate(Coverage::Partial, 0, confidence, rounds),
                    GateVerdict::AwaitingMoreVideo
                );
                assert_eq!(
                    gate(Coverage::Partial, 4, confidence, rounds),
                    GateVerdict::AwaitingMoreVideo
                );
            }
        }
    }

    #[test]
    fn clean_full_coverage_is_report_ready() {
        for confidence in [Confidence::Low, Confidence::Moderate, Confidence::High] {
            for rounds in [0, 1, 2] {
                assert_eq!(
                    gate(Coverage::Full, 0, confidence, rounds),
                    GateVerdict::ReportReady
                );
            }
        }
    }

    #[test]
    fn unresolved_with_high_confidence_after_round_proceeds() {
        assert_eq!(
            gate(Coverage::Full, 2, Confidence::High, 1),
            GateVerdict::ReportReady
        );
    }

    #[test]
    fn unresolved_before_any_round_triggers_clarification() {
        assert_eq!(
            gate(Coverage::Full, 1, Confidence::Low, 0),
            GateVerdict::ClarificationPending
        );
        assert_eq!(
            gate(Coverage::Full, 1, Confidence::Moderate, 0),
            GateVerdict::ClarificationPending
        );
        // High confidence with open discrepancies still gets its one round.
        assert_eq!(
            gate(Coverage::Full, 1, Confidence::High, 0),
            GateVerdict::ClarificationPending
        );
    }

    #[test]
    fn unresolved_after_round_escalates_explicitly() {
        assert_eq!(
            gate(Coverage::Full, 1, Confidence::Low, 1),
            GateVerdict::AwaitingMoreClarification
        );
        assert_eq!(
            gate(Coverage::Full, 3, Confidence::Moderate, 1),
            GateVerdict::AwaitingMoreClarification
        );
    }
}
