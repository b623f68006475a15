//! Cross-context pattern integration.
//!
//! Merges per-video observations into patterns and classifies pervasiveness
//! over *distinct contexts*: two videos filmed in the same context count as
//! one context. The classification is the core diagnostic rule and is fully
//! deterministic; ties resolve toward the weaker clinical claim.

use std::collections::{BTreeMap, BTreeSet};

use kinsight_model::{
    ArtifactId, ClarificationAnswer, ClarificationQuestion, Domain, IndividualVideoAnalysis,
    InterviewSummary, ObservationContext, Pattern, Pervasiveness, Polarity, QuestionCategory,
    StrengthChallengeBalance,
};
use tracing::debug;

/// Merge observations across video analyses into classified patterns.
///
/// Grouping key is `(domain, polarity)`: the same domain can carry both a
/// strength pattern and a challenge pattern (eye contact that works at home
/// and fails with peers). Interview concerns whose domain never appears in
/// any observation yield `NotObserved` patterns so the absence is auditable.
///
/// Output is sorted by `(domain, polarity)` and is identical across repeated
/// calls with the same inputs.
pub fn integrate_patterns(
    analyses: &[(ArtifactId, IndividualVideoAnalysis)],
    interview: &InterviewSummary,
) -> Vec<Pattern> {
    let total_contexts: BTreeSet<&ObservationContext> =
        analyses.iter().map(|(_, a)| &a.context).collect();
    let total = total_contexts.len();

    #[derive(Default)]
    struct Group {
        contexts: BTreeSet<ObservationContext>,
        supporting: BTreeSet<ArtifactId>,
        observation_count: usize,
        first_text: Option<String>,
    }

    let mut groups: BTreeMap<(Domain, bool), Group> = BTreeMap::new();
    for (id, analysis) in analyses {
        for obs in &analysis.observations {
            let key = (obs.domain.clone(), matches!(obs.polarity, Polarity::Challenge));
            let group = groups.entry(key).or_default();
            group.contexts.insert(analysis.context.clone());
            group.supporting.insert(id.clone());
            group.observation_count += 1;
            if group.first_text.is_none() {
                group.first_text = Some(obs.text.clone());
            }
        }
    }

    let mut patterns: Vec<Pattern> = groups
        .into_iter()
        .map(|((domain, is_challenge), group)| {
            let covered = group.contexts.len();
            let pervasiveness = classify(covered, total, group.observation_count);
            debug!(
                domain = ?domain,
                covered,
                total,
                classification = ?pervasiveness,
                "classified pattern"
            );
            Pattern {
                description: group.first_text.unwrap_or_default(),
                domain,
                pervasiveness,
                supporting_analyses: group.supporting,
                contexts: group.contexts,
                polarity: if is_challenge {
                    Polarity::Challenge
                } else {
                    Polarity::Strength
                },
                parent_confirmed: false,
            }
        })
        .collect();

    // Interview concerns with no observational echo at all.
    for concern in &interview.concerns {
        let seen = patterns.iter().any(|p| p.domain == concern.domain);
        if !seen {
            patterns.push(Pattern {
                description: concern.description.clone(),
                domain: concern.domain.clone(),
                pervasiveness: Pervasiveness::NotObserved,
                supporting_analyses: BTreeSet::new(),
                contexts: BTreeSet::new(),
                polarity: concern.polarity,
                parent_confirmed: false,
            });
        }
    }

    patterns.sort_by(|a, b| {
        (a.domain.clone(), matches!(a.polarity, Polarity::Challenge))
            .cmp(&(b.domain.clone(), matches!(b.polarity, Polarity::Challenge)))
    });
    patterns
}

/// The pervasiveness decision table.
///
/// `Pervasive` requires covering *every* analyzed context (and at least
/// two); exactly all-but-one context is the tie case and resolves to
/// `ContextSpecific`. A lone supporting observation stays `Minimal` no
/// matter where it occurred.
fn classify(covered: usize, total: usize, observation_count: usize) -> Pervasiveness {
    if covered == 0 {
        Pervasiveness::NotObserved
    } else if observation_count == 1 {
        Pervasiveness::Minimal
    } else if covered == total && total >= 2 {
        Pervasiveness::Pervasive
    } else {
        Pervasiveness::ContextSpecific
    }
}

/// Patterns whose pervasiveness is undetermined: context-specific but one
/// context short of pervasive, with no parent confirmation yet. These are
/// clarification candidates.
#[must_use]
pub fn pervasiveness_gaps(patterns: &[Pattern], total_contexts: usize) -> Vec<&Pattern> {
    patterns
        .iter()
        .filter(|p| {
            p.pervasiveness == Pervasiveness::ContextSpecific
                && !p.parent_confirmed
                && total_contexts >= 2
                && p.contexts.len() + 1 == total_contexts
        })
        .collect()
}

/// Apply parent pervasiveness confirmations from clarification answers.
///
/// A yes/no pervasiveness question answered "yes" (structured choice)
/// upgrades its target pattern to `Pervasive` with `parent_confirmed` set,
/// the one path to `Pervasive` that does not require full context coverage.
/// Returns the upgraded set plus the number of newly confirmed patterns.
pub fn confirm_pervasive_from_answers(
    patterns: &[Pattern],
    questions: &[ClarificationQuestion],
    answers: &[ClarificationAnswer],
) -> (Vec<Pattern>, usize) {
    let mut out = patterns.to_vec();
    let mut newly_confirmed = 0;

    for question in questions {
        if question.category != QuestionCategory::Pervasiveness {
            continue;
        }
        let Some(target) = question.record_ref.as_deref() else {
            continue;
        };
        let confirmed = answers.iter().any(|a| {
            a.question_id == question.id
                && !a.is_skipped()
                && a.structured_choice.as_deref() == Some("yes")
        });
        if !confirmed {
            continue;
        }
        if let Some(pattern) = out
            .iter_mut()
            .find(|p| p.description == target && !p.parent_confirmed)
        {
            pattern.parent_confirmed = true;
            if pattern.pervasiveness == Pervasiveness::ContextSpecific {
                pattern.pervasiveness = Pervasiveness::Pervasive;
                newly_confirmed += 1;
            }
        }
    }

    (out, newly_confirmed)
}

/// Derived strength/challenge summary for reporting. Never feeds back into
/// classification.
#[must_use]
pub fn balance(patterns: &[Pattern]) -> StrengthChallengeBalance {
    StrengthChallengeBalance {
        pervasive_challenges: patterns
            .iter()
            .filter(|p| {
                p.polarity == Polarity::Challenge && p.pervasiveness == Pervasiveness::Pervasive
            })
            .count(),
        core_strengths: patterns
            .iter()
            .filter(|p| {
                p.polarity == Polarity::Strength && p.pervasiveness != Pervasiveness::NotObserved
            })
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinsight_model::{
        ArtifactKind, CoverageVerdict, Frequency, GuidelineId, Observation, ReportedConcern,
    };
    use proptest::prelude::*;

    fn analysis(
        seq: u32,
        context: ObservationContext,
        observations: Vec<Observation>,
    ) -> (ArtifactId, IndividualVideoAnalysis) {
        (
            ArtifactId::new(ArtifactKind::VideoAnalysis, seq),
            IndividualVideoAnalysis {
                schema_version: IndividualVideoAnalysis::SCHEMA_VERSION.to_string(),
                guideline_id: GuidelineId(format!("g-{seq}")),
                context,
                observations,
                strengths: vec!["settles with routine".into(), "shares toys".into()],
                coverage: CoverageVerdict::Captured,
            },
        )
    }

    fn obs(domain: Domain, polarity: Polarity, text: &str) -> Observation {
        Observation {
            text: text.into(),
            domain,
            polarity,
            frequency: None,
            evidence_ref: None,
        }
    }

    fn empty_interview() -> InterviewSummary {
        InterviewSummary::new(vec![], vec![], vec![])
    }

    #[test]
    fn all_contexts_covered_is_pervasive() {
        let analyses = vec![
            analysis(
                1,
                ObservationContext::Home,
                vec![obs(Domain::PeerInteraction, Polarity::Challenge, "rarely initiates")],
            ),
            analysis(
                2,
                ObservationContext::Peers,
                vec![obs(Domain::PeerInteraction, Polarity::Challenge, "watches from edge")],
            ),
        ];
        let patterns = integrate_patterns(&analyses, &empty_interview());
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pervasiveness, Pervasiveness::Pervasive);
        assert_eq!(patterns[0].contexts.len(), 2);
    }

    #[test]
    fn all_but_one_context_resolves_conservatively() {
        // Exactly (all_contexts - 1) supporting contexts, no parent
        // confirmation: must be context_specific, never pervasive.
        let analyses = vec![
            analysis(
                1,
                ObservationContext::Home,
                vec![obs(Domain::Attention, Polarity::Challenge, "drifts off task")],
            ),
            analysis(
                2,
                ObservationContext::Peers,
                vec![obs(Domain::Attention, Polarity::Challenge, "drifts in group play")],
            ),
            analysis(3, ObservationContext::Mealtime, vec![]),
        ];
        let patterns = integrate_patterns(&analyses, &empty_interview());
        assert_eq!(patterns[0].pervasiveness, Pervasiveness::ContextSpecific);
    }

    #[test]
    fn same_context_twice_counts_once() {
        let analyses = vec![
            analysis(
                1,
                ObservationContext::Home,
                vec![obs(Domain::Language, Polarity::Challenge, "single words only")],
            ),
            analysis(
                2,
                ObservationContext::Home,
                vec![obs(Domain::Language, Polarity::Challenge, "no two-word phrases")],
            ),
            analysis(3, ObservationContext::Peers, vec![]),
        ];
        // Observed in one distinct context out of two.
        let patterns = integrate_patterns(&analyses, &empty_interview());
        assert_eq!(patterns[0].pervasiveness, Pervasiveness::ContextSpecific);
        assert_eq!(patterns[0].contexts.len(), 1);
    }

    #[test]
    fn single_observation_is_minimal() {
        let analyses = vec![
            analysis(
                1,
                ObservationContext::Home,
                vec![obs(Domain::Sensory, Polarity::Challenge, "covers ears once")],
            ),
            analysis(2, ObservationContext::Peers, vec![]),
        ];
        let patterns = integrate_patterns(&analyses, &empty_interview());
        assert_eq!(patterns[0].pervasiveness, Pervasiveness::Minimal);
    }

    #[test]
    fn unobserved_interview_concern_becomes_not_observed_pattern() {
        let interview = InterviewSummary::new(
            vec![ReportedConcern {
                domain: Domain::Motor,
                description: "trips over feet".into(),
                frequency: Some(Frequency::Often),
                polarity: Polarity::Challenge,
            }],
            vec![],
            vec![],
        );
        let analyses = vec![analysis(1, ObservationContext::Home, vec![])];
        let patterns = integrate_patterns(&analyses, &interview);
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].pervasiveness, Pervasiveness::NotObserved);
        assert_eq!(patterns[0].domain, Domain::Motor);
    }

    #[test]
    fn eye_contact_scenario_splits_by_polarity() {
        // Home video shows eye contact working; peer video shows it absent.
        let analyses = vec![
            analysis(
                1,
                ObservationContext::Home,
                vec![
                    obs(Domain::EyeContact, Polarity::Strength, "eye contact in 4/5 play segments"),
                    obs(Domain::EyeContact, Polarity::Strength, "sustained gaze during tickles"),
                ],
            ),
            analysis(
                2,
                ObservationContext::Peers,
                vec![
                    obs(Domain::EyeContact, Polarity::Challenge, "no eye contact with peers"),
                    obs(Domain::EyeContact, Polarity::Challenge, "averts gaze when approached"),
                ],
            ),
        ];
        let patterns = integrate_patterns(&analyses, &empty_interview());
        assert_eq!(patterns.len(), 2);

        let challenge = patterns
            .iter()
            .find(|p| p.polarity == Polarity::Challenge)
            .unwrap();
        assert_eq!(challenge.pervasiveness, Pervasiveness::ContextSpecific);
        assert!(challenge.contexts.contains(&ObservationContext::Peers));
        assert_eq!(challenge.contexts.len(), 1);
    }

    #[test]
    fn gap_detection() {
        let analyses = vec![
            analysis(
                1,
                ObservationContext::Home,
                vec![obs(Domain::Regulation, Polarity::Challenge, "meltdown on transition")],
            ),
            analysis(
                2,
                ObservationContext::Peers,
                vec![obs(Domain::Regulation, Polarity::Challenge, "meltdown at handover")],
            ),
            analysis(3, ObservationContext::Mealtime, vec![]),
        ];
        let patterns = integrate_patterns(&analyses, &empty_interview());
        let gaps = pervasiveness_gaps(&patterns, 3);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].domain, Domain::Regulation);
    }

    #[test]
    fn parent_confirmation_upgrades_gap() {
        use chrono::Utc;
        use kinsight_model::{AnswerType, Priority, QuestionId};

        let pattern = Pattern {
            description: "meltdown on transition".into(),
            domain: Domain::Regulation,
            pervasiveness: Pervasiveness::ContextSpecific,
            supporting_analyses: BTreeSet::new(),
            contexts: [ObservationContext::Home, ObservationContext::Peers]
                .into_iter()
                .collect(),
            polarity: Polarity::Challenge,
            parent_confirmed: false,
        };
        let question = ClarificationQuestion {
            id: QuestionId("q-1".into()),
            category: QuestionCategory::Pervasiveness,
            priority: Priority::High,
            trigger: ArtifactId::new(ArtifactKind::Integration, 1),
            record_ref: Some("meltdown on transition".into()),
            text: "Does this also happen at mealtimes?".into(),
            answer_type: AnswerType::YesNo,
        };
        let answer = ClarificationAnswer::answered(
            QuestionId("q-1".into()),
            "yes, every mealtime",
            Some("yes".into()),
            Utc::now(),
        );

        let (upgraded, newly) =
            confirm_pervasive_from_answers(&[pattern.clone()], &[question.clone()], &[answer]);
        assert_eq!(newly, 1);
        assert_eq!(upgraded[0].pervasiveness, Pervasiveness::Pervasive);
        assert!(upgraded[0].parent_confirmed);

        // A skipped answer confirms nothing.
        let skipped = ClarificationAnswer::skipped(QuestionId("q-1".into()), Utc::now());
        let (same, newly) = confirm_pervasive_from_answers(&[pattern], &[question], &[skipped]);
        assert_eq!(newly, 0);
        assert_eq!(same[0].pervasiveness, Pervasiveness::ContextSpecific);
    }

    #[test]
    fn balance_is_derived_only() {
        let analyses = vec![
            analysis(
                1,
                ObservationContext::Home,
                vec![
                    obs(Domain::PeerInteraction, Polarity::Challenge, "rarely initiates"),
                    obs(Domain::Play, Polarity::Strength, "rich pretend play"),
                ],
            ),
            analysis(
                2,
                ObservationContext::Peers,
                vec![
                    obs(Domain::PeerInteraction, Polarity::Challenge, "watches from edge"),
                    obs(Domain::Play, Polarity::Strength, "builds elaborate scenes"),
                ],
            ),
        ];
        let patterns = integrate_patterns(&analyses, &empty_interview());
        let b = balance(&patterns);
        assert_eq!(b.pervasive_challenges, 1);
        assert_eq!(b.core_strengths, 1);
    }

    proptest! {
        // Pure-function property: identical inputs, identical classification.
        #[test]
        fn integration_is_deterministic(seed in 0u32..50) {
            let contexts = [
                ObservationContext::Home,
                ObservationContext::Peers,
                ObservationContext::Mealtime,
            ];
            let analyses: Vec<_> = (0..(seed % 5 + 1))
                .map(|i| {
                    let ctx = contexts[(i as usize + seed as usize) % 3].clone();
                    let mut observations = vec![];
                    if (seed + i) % 2 == 0 {
                        observations.push(obs(
                            Domain::Attention,
                            Polarity::Challenge,
                            "drifts off task",
                        ));
                    }
                    if (seed + i) % 3 == 0 {
                        observations.push(obs(Domain::Play, Polarity::Strength, "pretend play"));
                    }
                    analysis(i + 1, ctx, observations)
                })
                .collect();
            let interview = empty_interview();
            let first = integrate_patterns(&analyses, &interview);
            let second = integrate_patterns(&analyses, &interview);
            prop_assert_eq!(first, second);
        }
    }
}
