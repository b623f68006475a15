//! Confidence ledger transitions.
//!
//! The rule table is explicit so the same round of evidence always moves
//! confidence the same way; nothing here is left to free-text judgment.

use kinsight_model::Confidence;
use tracing::{info, warn};

/// Signals gathered from one completed clarification round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSignals {
    pub resolved_discrepancies: usize,
    pub newly_confirmed_pervasive: usize,
    pub unexplained_contradictions: usize,
}

/// Recompute confidence after a round.
///
/// Rules, in order:
/// - any unexplained contradiction blocks an increase this round, no matter
///   what else resolved;
/// - otherwise one resolved discrepancy or one newly confirmed pervasive
///   pattern raises confidence one level;
/// - otherwise confidence is unchanged.
///
/// Confidence never decreases here; the one downgrade path is
/// [`downgrade_for_contradicted_pervasive`].
#[must_use]
pub fn update_confidence(previous: Confidence, signals: RoundSignals) -> (Confidence, String) {
    if signals.unexplained_contradictions > 0 {
        let reason = format!(
            "{} unexplained contradiction(s) block a confidence increase this round",
            signals.unexplained_contradictions
        );
        info!(confidence = ?previous, %reason, "confidence held");
        return (previous, reason);
    }

    if signals.resolved_discrepancies >= 1 || signals.newly_confirmed_pervasive >= 1 {
        let next = previous.raised();
        let reason = format!(
            "resolved {} discrepancy(ies), confirmed {} pervasive pattern(s)",
            signals.resolved_discrepancies, signals.newly_confirmed_pervasive
        );
        info!(from = ?previous, to = ?next, %reason, "confidence raised");
        return (next, reason);
    }

    (previous, "no new resolving evidence this round".to_string())
}

/// The one explicit downgrade path: a new video contradicted a previously
/// pervasive classification. Always logged with cause.
#[must_use]
pub fn downgrade_for_contradicted_pervasive(
    previous: Confidence,
    pattern_description: &str,
) -> (Confidence, String) {
    let next = previous.lowered();
    let reason = format!(
        "new video evidence contradicts previously pervasive pattern: {pattern_description}"
    );
    warn!(from = ?previous, to = ?next, %reason, "confidence downgraded");
    (next, reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_raises_one_level() {
        let (c, _) = update_confidence(
            Confidence::Low,
            RoundSignals {
                resolved_discrepancies: 1,
                ..Default::default()
            },
        );
        assert_eq!(c, Confidence::Moderate);

        let (c, _) = update_confidence(
            Confidence::Moderate,
            RoundSignals {
                newly_confirmed_pervasive: 2,
                ..Default::default()
            },
        );
        assert_eq!(c, Confidence::High);
    }

    #[test]
    fn high_saturates() {
        let (c, _) = update_confidence(
            Confidence::High,
            RoundSignals {
                resolved_discrepancies: 3,
                ..Default::default()
            },
        );
        assert_eq!(c, Confidence::High);
    }

    #[test]
    fn unexplained_contradiction_blocks_increase() {
        // Even with otherwise sufficient signals.
        let (c, reason) = update_confidence(
            Confidence::Low,
            RoundSignals {
                resolved_discrepancies: 2,
                newly_confirmed_pervasive: 1,
                unexplained_contradictions: 1,
            },
        );
        assert_eq!(c, Confidence::Low);
        assert!(reason.contains("unexplained contradiction"));
    }

    #[test]
    fn no_signals_no_change() {
        let (c, _) = update_confidence(Confidence::Moderate, RoundSignals::default());
        assert_eq!(c, Confidence::Moderate);
    }

    #[test]
    fn downgrade_path_logs_cause() {
        let (c, reason) =
            downgrade_for_contradicted_pervasive(Confidence::High, "limited peer initiation");
        assert_eq!(c, Confidence::Moderate);
        assert!(reason.contains("limited peer initiation"));

        let (c, _) = downgrade_for_contradicted_pervasive(Confidence::Low, "x");
        assert_eq!(c, Confidence::Low);
    }
}
