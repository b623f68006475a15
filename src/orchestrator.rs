//! Stage orchestrator: drives a case through the assessment pipeline.
//!
//! Every operation loads the case head, checks the current stage, does its
//! work, appends artifacts, and persists the new stage. Stage transitions
//! come back as [`StageEvent`]s for the notification layer. Oracle failures
//! leave the stage untouched, so a crashed or exhausted invocation can be
//! replayed by re-running the same operation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use kinsight_integrate::{
    AnswerInterpretation, Candidate, RoundSignals, balance, confirm_pervasive_from_answers,
    downgrade_for_contradicted_pervasive, gate, integrate_patterns, pervasiveness_gaps,
    resolve_discrepancies, resolve_with_answers, select_questions, update_confidence,
};
use kinsight_model::{
    AnswerType, ArtifactId, ArtifactKind, CaseId, ClarificationAnswer, ClarificationQuestion,
    Confidence, ConfidenceLedger, Coverage, GateVerdict, GuidelineId, IndividualVideoAnalysis,
    IntegrationAnalysis, InterviewSummary, KinsightError, LedgerEntry, Pattern, Pervasiveness,
    QuestionCategory, QuestionId, ResolutionState, Stage, StageEvent, StrengthChallengeBalance,
    VideoGuideline,
};
use kinsight_oracle::{Oracle, OracleRequest, TemplateId};

use crate::case::Case;
use crate::store::CaseStore;

/// Stored payload of a clarification round's question set. `base` pins the
/// integration analysis the questions were derived from; re-integration
/// refuses to run against any other head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub schema_version: String,
    pub base: ArtifactId,
    pub questions: Vec<ClarificationQuestion>,
}

impl QuestionSet {
    pub const SCHEMA_VERSION: &'static str = "clarification-questions.v1";
}

/// Stored payload of one batch of parent answers. A round may arrive in
/// several batches; the union counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerBatch {
    pub schema_version: String,
    pub answers: Vec<ClarificationAnswer>,
}

impl AnswerBatch {
    pub const SCHEMA_VERSION: &'static str = "clarification-answers.v1";
}

/// One incoming parent response, before validation against the open
/// question set.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub skip: bool,
}

/// Package handed to the report collaborator once the gate says
/// `ReportReady`. Unexplained contradictions ride along verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportHandoff {
    pub schema_version: String,
    pub case_id: CaseId,
    pub integration: ArtifactId,
    pub narrative: Option<String>,
    pub patterns: Vec<Pattern>,
    pub balance: StrengthChallengeBalance,
    pub confidence: Confidence,
    pub limitations: Vec<String>,
}

impl ReportHandoff {
    pub const SCHEMA_VERSION: &'static str = "report-handoff.v1";
}

pub struct StageOrchestrator {
    store: CaseStore,
    oracle: Arc<dyn Oracle>,
}

impl StageOrchestrator {
    #[must_use]
    pub fn new(store: CaseStore, oracle: Arc<dyn Oracle>) -> Self {
        Self { store, oracle }
    }

    #[must_use]
    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    /// Create a case in `AwaitingInterview`.
    pub fn create_case(
        &self,
        case_id: CaseId,
        child_ref: &str,
    ) -> Result<(Case, Vec<StageEvent>), KinsightError> {
        let case = self.store.create_case(case_id, child_ref)?;
        let event = StageEvent::new(
            case.case_id.clone(),
            Stage::AwaitingInterview,
            "case created; interview summary needed",
        );
        Ok((case, vec![event]))
    }

    /// Ingest the structured interview summary and open the video window.
    #[instrument(skip(self, summary), fields(case = %case_id))]
    pub fn submit_interview(
        &self,
        case_id: &CaseId,
        summary: InterviewSummary,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        require_stage(&case, &[Stage::AwaitingInterview], "submit_interview")?;

        if summary.video_guidelines.is_empty() {
            return Err(KinsightError::MalformedSubmission(
                "interview summary carries no filming guidelines".to_string(),
            ));
        }

        self.store
            .append_artifact(&mut case, ArtifactKind::Interview, &summary, None)?;
        let guidelines = summary.video_guidelines.len();
        Ok(vec![self.transition(
            &mut case,
            Stage::AwaitingVideos,
            format!("interview recorded; awaiting videos for {guidelines} guideline(s)"),
        )?])
    }

    /// Analyze one submitted video against its filming guideline.
    ///
    /// Allowed while videos are still expected and when the gate has asked
    /// for more footage. When the last open guideline is fulfilled the case
    /// moves straight to `Integrating`.
    #[instrument(skip(self, evidence), fields(case = %case_id, guideline = %guideline_id.0))]
    pub async fn submit_video(
        &self,
        case_id: &CaseId,
        guideline_id: &GuidelineId,
        evidence: serde_json::Value,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        require_stage(
            &case,
            &[
                Stage::AwaitingVideos,
                Stage::AnalyzingVideos,
                Stage::AwaitingMoreVideo,
            ],
            "submit_video",
        )?;

        let interview = self.interview(&case)?;
        let analysis = self
            .analyze_video(&case, &interview, guideline_id, evidence)
            .await?;
        self.store.append_artifact(
            &mut case,
            ArtifactKind::VideoAnalysis,
            &analysis,
            Some(guideline_id.0.clone()),
        )?;

        self.after_video(&mut case, &interview)
    }

    /// Analyze a batch of videos concurrently, appending results in input
    /// order once all analyses are in.
    pub async fn submit_videos(
        &self,
        case_id: &CaseId,
        videos: Vec<(GuidelineId, serde_json::Value)>,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        require_stage(
            &case,
            &[
                Stage::AwaitingVideos,
                Stage::AnalyzingVideos,
                Stage::AwaitingMoreVideo,
            ],
            "submit_video",
        )?;
        let interview = self.interview(&case)?;

        let mut set = JoinSet::new();
        for (index, (guideline_id, evidence)) in videos.into_iter().enumerate() {
            let oracle = Arc::clone(&self.oracle);
            let case_id = case.case_id.clone();
            let guideline = find_guideline(&interview, &guideline_id)?.clone();
            let concerns = interview.concerns.clone();
            set.spawn(async move {
                let analysis =
                    run_video_analysis(&*oracle, &case_id, &guideline, &concerns, evidence).await;
                (index, guideline.id, analysis)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            let (index, guideline_id, analysis) = joined
                .map_err(|e| KinsightError::Store(format!("analysis task panicked: {e}")))?;
            results.push((index, guideline_id, analysis?));
        }
        results.sort_by_key(|(index, ..)| *index);

        for (_, guideline_id, analysis) in results {
            self.store.append_artifact(
                &mut case,
                ArtifactKind::VideoAnalysis,
                &analysis,
                Some(guideline_id.0),
            )?;
        }
        self.after_video(&mut case, &interview)
    }

    /// The parent declares no further videos are coming. Unfulfilled
    /// guidelines are marked declined and integration proceeds on whatever
    /// evidence exists.
    #[instrument(skip(self), fields(case = %case_id))]
    pub fn declare_no_more_videos(
        &self,
        case_id: &CaseId,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        require_stage(
            &case,
            &[
                Stage::AwaitingVideos,
                Stage::AnalyzingVideos,
                Stage::AwaitingMoreVideo,
            ],
            "declare_no_more_videos",
        )?;

        let interview = self.interview(&case)?;
        let fulfilled: BTreeSet<GuidelineId> = case.fulfilled_guidelines().into_iter().collect();
        for guideline in &interview.video_guidelines {
            if !fulfilled.contains(&guideline.id)
                && !case.declined_guidelines.contains(&guideline.id)
            {
                case.declined_guidelines.push(guideline.id.clone());
            }
        }
        if !case.declined_guidelines.is_empty() {
            warn!(
                declined = case.declined_guidelines.len(),
                "parent declined remaining guidelines"
            );
        }
        Ok(vec![self.transition(
            &mut case,
            Stage::Integrating,
            "no further videos expected; integrating available evidence",
        )?])
    }

    /// Run the first-pass integration: patterns, discrepancies, coverage,
    /// confidence, the sufficiency gate, and (when the gate asks for it) a
    /// clarification round.
    #[instrument(skip(self), fields(case = %case_id))]
    pub async fn integrate(&self, case_id: &CaseId) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        require_stage(&case, &[Stage::Integrating], "integrate")?;

        let interview = self.interview(&case)?;
        let analyses = self.video_analyses(&case)?;
        let analysis_refs: Vec<&IndividualVideoAnalysis> =
            analyses.iter().map(|(_, a)| a).collect();

        let patterns = integrate_patterns(&analyses, &interview);
        let records = resolve_discrepancies(&interview, &analysis_refs);
        let coverage = compute_coverage(&interview, &case, &analyses);

        // A new video after a gate loop can contradict an earlier pervasive
        // classification; that is the one confidence downgrade path.
        let predecessor = case.latest(ArtifactKind::Integration).map(|r| r.id.clone());
        let mut confidence = self.ledger(&case)?.current();
        let mut delta_reason = "initial integration".to_string();
        if let Some(prev_id) = &predecessor {
            let previous: IntegrationAnalysis = self.store.read_artifact(&case, prev_id)?;
            delta_reason = "re-integration with extended evidence".to_string();
            for prev_pattern in &previous.patterns {
                if prev_pattern.pervasiveness != Pervasiveness::Pervasive {
                    continue;
                }
                let demoted = patterns.iter().any(|p| {
                    p.domain == prev_pattern.domain
                        && p.polarity == prev_pattern.polarity
                        && p.pervasiveness != Pervasiveness::Pervasive
                });
                if demoted {
                    let (lowered, reason) =
                        downgrade_for_contradicted_pervasive(confidence, &prev_pattern.description);
                    confidence = lowered;
                    delta_reason = reason;
                }
            }
        }

        self.finish_integration(
            &mut case,
            &interview,
            IntegrationInputs {
                patterns,
                records,
                coverage,
                confidence,
                delta_reason,
                predecessor,
                contributing_answers: Vec::new(),
            },
        )
        .await
    }

    /// The parent opened the question card; answers may now arrive.
    pub fn open_clarification(&self, case_id: &CaseId) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        require_stage(&case, &[Stage::ClarificationPending], "open_clarification")?;
        Ok(vec![self.transition(
            &mut case,
            Stage::ClarificationAnswering,
            "clarification round opened",
        )?])
    }

    /// Ingest a batch of parent answers.
    ///
    /// The whole batch is validated against the open question set before
    /// anything is written; an unknown or duplicate question id rejects the
    /// submission with no state change. Once every question is answered or
    /// skipped, re-integration runs immediately.
    #[instrument(skip(self, submissions), fields(case = %case_id))]
    pub async fn submit_answers(
        &self,
        case_id: &CaseId,
        submissions: Vec<AnswerSubmission>,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        // ReIntegrating is accepted so a round interrupted by an Oracle
        // failure mid-re-integration can be resubmitted.
        require_stage(
            &case,
            &[
                Stage::ClarificationPending,
                Stage::ClarificationAnswering,
                Stage::ReIntegrating,
            ],
            "submit_answers",
        )?;

        let round = self.open_round(&case)?;
        let known: BTreeSet<&QuestionId> = round.questions.iter().map(|q| &q.id).collect();
        let mut seen: BTreeSet<&QuestionId> = BTreeSet::new();
        for submission in &submissions {
            if !known.contains(&submission.question_id) {
                return Err(KinsightError::MalformedSubmission(format!(
                    "unknown question id '{}'",
                    submission.question_id.0
                )));
            }
            if !seen.insert(&submission.question_id) {
                return Err(KinsightError::MalformedSubmission(format!(
                    "duplicate answer for question '{}'",
                    submission.question_id.0
                )));
            }
        }

        let now = Utc::now();
        let answers: Vec<ClarificationAnswer> = submissions
            .into_iter()
            .map(|s| {
                if s.skip || (s.text.is_none() && s.choice.is_none()) {
                    ClarificationAnswer::skipped(s.question_id, now)
                } else {
                    ClarificationAnswer::answered(
                        s.question_id,
                        s.text.unwrap_or_default(),
                        s.choice,
                        now,
                    )
                }
            })
            .collect();

        let mut events = Vec::new();
        if case.current_stage == Stage::ClarificationPending {
            events.push(self.transition(
                &mut case,
                Stage::ClarificationAnswering,
                "clarification round opened",
            )?);
        }

        let batch = AnswerBatch {
            schema_version: AnswerBatch::SCHEMA_VERSION.to_string(),
            answers,
        };
        self.store
            .append_artifact(&mut case, ArtifactKind::ClarificationAnswers, &batch, None)?;

        let collected = self.collected_answers(&case, &round);
        if collected.len() == round.questions.len() {
            events.extend(self.reintegrate(&mut case, &round, collected).await?);
        } else {
            info!(
                answered = collected.len(),
                total = round.questions.len(),
                "partial answer batch recorded"
            );
        }
        Ok(events)
    }

    /// The parent moves on without finishing the round. Remaining questions
    /// are recorded as skipped and re-integration runs on what was given.
    #[instrument(skip(self), fields(case = %case_id))]
    pub async fn proceed_without_answers(
        &self,
        case_id: &CaseId,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let mut case = self.store.load_case(case_id)?;
        require_stage(
            &case,
            &[
                Stage::ClarificationPending,
                Stage::ClarificationAnswering,
                Stage::ReIntegrating,
            ],
            "proceed_without_answers",
        )?;

        let round = self.open_round(&case)?;
        let collected = self.collected_answers(&case, &round);
        let now = Utc::now();
        let missing: Vec<ClarificationAnswer> = round
            .questions
            .iter()
            .filter(|q| !collected.iter().any(|a| a.question_id == q.id))
            .map(|q| ClarificationAnswer::skipped(q.id.clone(), now))
            .collect();

        let mut events = Vec::new();
        if case.current_stage == Stage::ClarificationPending {
            events.push(self.transition(
                &mut case,
                Stage::ClarificationAnswering,
                "clarification round opened",
            )?);
        }
        if !missing.is_empty() {
            let batch = AnswerBatch {
                schema_version: AnswerBatch::SCHEMA_VERSION.to_string(),
                answers: missing,
            };
            self.store.append_artifact(
                &mut case,
                ArtifactKind::ClarificationAnswers,
                &batch,
                None,
            )?;
        }

        let collected = self.collected_answers(&case, &round);
        events.extend(self.reintegrate(&mut case, &round, collected).await?);
        Ok(events)
    }

    /// The sufficiency verdict recorded on the head integration analysis.
    pub fn gate_verdict(&self, case_id: &CaseId) -> Result<Option<GateVerdict>, KinsightError> {
        let case = self.store.load_case(case_id)?;
        match case.latest(ArtifactKind::Integration) {
            None => Ok(None),
            Some(record) => {
                let analysis: IntegrationAnalysis = self.store.read_artifact(&case, &record.id)?;
                Ok(analysis.sufficiency)
            }
        }
    }

    /// Package the head integration for the report collaborator.
    pub fn report_handoff(&self, case_id: &CaseId) -> Result<ReportHandoff, KinsightError> {
        let case = self.store.load_case(case_id)?;
        require_stage(&case, &[Stage::ReportReady], "report_handoff")?;
        let record = case
            .latest(ArtifactKind::Integration)
            .ok_or_else(|| KinsightError::Store("no integration analysis on case".to_string()))?;
        let analysis: IntegrationAnalysis = self.store.read_artifact(&case, &record.id)?;
        Ok(ReportHandoff {
            schema_version: ReportHandoff::SCHEMA_VERSION.to_string(),
            case_id: case.case_id.clone(),
            integration: record.id.clone(),
            narrative: analysis.narrative,
            patterns: analysis.patterns,
            balance: analysis.balance,
            confidence: analysis.confidence,
            limitations: analysis.limitations,
        })
    }

    // ---- internals ----

    async fn analyze_video(
        &self,
        case: &Case,
        interview: &InterviewSummary,
        guideline_id: &GuidelineId,
        evidence: serde_json::Value,
    ) -> Result<IndividualVideoAnalysis, KinsightError> {
        let guideline = find_guideline(interview, guideline_id)?;
        run_video_analysis(
            &*self.oracle,
            &case.case_id,
            guideline,
            &interview.concerns,
            evidence,
        )
        .await
    }

    fn after_video(
        &self,
        case: &mut Case,
        interview: &InterviewSummary,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let fulfilled: BTreeSet<GuidelineId> = case.fulfilled_guidelines().into_iter().collect();
        let open = interview
            .video_guidelines
            .iter()
            .filter(|g| !fulfilled.contains(&g.id) && !case.declined_guidelines.contains(&g.id))
            .count();

        if open == 0 || case.current_stage == Stage::AwaitingMoreVideo {
            Ok(vec![self.transition(
                case,
                Stage::Integrating,
                "video evidence complete; integrating",
            )?])
        } else if case.current_stage == Stage::AwaitingVideos {
            Ok(vec![self.transition(
                case,
                Stage::AnalyzingVideos,
                format!("video analyzed; {open} guideline(s) still open"),
            )?])
        } else {
            self.store.save_head(case)?;
            Ok(Vec::new())
        }
    }

    /// Shared tail of integrate and reintegrate: gate, narrative, artifact
    /// writes, and the stage transition the verdict demands.
    async fn finish_integration(
        &self,
        case: &mut Case,
        interview: &InterviewSummary,
        inputs: IntegrationInputs,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let IntegrationInputs {
            patterns,
            records,
            coverage,
            confidence,
            delta_reason,
            predecessor,
            contributing_answers,
        } = inputs;

        // Stale-head guard: the analysis must extend the current head.
        let head = case.latest(ArtifactKind::Integration).map(|r| r.id.clone());
        if predecessor != head {
            return Err(KinsightError::StaleArtifactReference {
                expected: head.unwrap_or_else(|| ArtifactId::new(ArtifactKind::Integration, 0)),
                found: predecessor.unwrap_or_else(|| ArtifactId::new(ArtifactKind::Integration, 0)),
            });
        }

        let unresolved = records
            .iter()
            .filter(|r| !r.resolution.is_resolved())
            .count();
        let rounds_done = case.rounds_done();
        let verdict = gate(coverage, unresolved_blocking(&records), confidence, rounds_done);

        let narrative = self.draft_narrative(case, &patterns, &records).await?;
        let limitations = collect_limitations(case, interview, &records);
        let version = case.all_of(ArtifactKind::Integration).len() as u32 + 1;
        let analysis = IntegrationAnalysis {
            schema_version: IntegrationAnalysis::SCHEMA_VERSION.to_string(),
            version,
            predecessor,
            balance: balance(&patterns),
            patterns,
            discrepancies: records,
            confidence,
            coverage,
            sufficiency: Some(verdict),
            narrative: Some(narrative),
            limitations,
        };
        let record =
            self.store
                .append_artifact(case, ArtifactKind::Integration, &analysis, None)?;

        let mut ledger = self.ledger(case)?;
        ledger.entries.push(LedgerEntry {
            version,
            confidence,
            delta_reason,
            contributing_answers,
        });
        self.store
            .append_artifact(case, ArtifactKind::ConfidenceLedger, &ledger, None)?;

        info!(
            integration = %record.id,
            unresolved,
            verdict = ?verdict,
            "integration analysis stored"
        );

        let mut events = vec![StageEvent::new(
            case.case_id.clone(),
            Stage::Gated,
            format!("sufficiency gate: {verdict:?}"),
        )];
        match verdict {
            GateVerdict::ClarificationPending => {
                events.push(self.open_clarification_round(case, &record.id, &analysis).await?);
            }
            GateVerdict::ReportReady => {
                events.push(self.transition(
                    case,
                    Stage::ReportReady,
                    "evidence sufficient; analysis ready for reporting",
                )?);
            }
            GateVerdict::AwaitingMoreVideo => {
                events.push(self.transition(
                    case,
                    Stage::AwaitingMoreVideo,
                    "coverage incomplete; more video evidence requested",
                )?);
            }
            GateVerdict::AwaitingMoreClarification => {
                events.push(self.transition(
                    case,
                    Stage::AwaitingMoreClarification,
                    "open questions remain after clarification; escalated for review",
                )?);
            }
        }
        Ok(events)
    }

    /// Select candidates from the fresh analysis, have the Oracle word them,
    /// and open the round.
    async fn open_clarification_round(
        &self,
        case: &mut Case,
        integration_id: &ArtifactId,
        analysis: &IntegrationAnalysis,
    ) -> Result<StageEvent, KinsightError> {
        let total_contexts: BTreeSet<_> = analysis
            .patterns
            .iter()
            .flat_map(|p| p.contexts.iter())
            .collect();
        let mut candidates = Vec::new();
        for record in &analysis.discrepancies {
            if record.resolution.is_resolved() {
                continue;
            }
            candidates.push(Candidate {
                category: if record.is_new_finding() {
                    QuestionCategory::NewFinding
                } else {
                    QuestionCategory::Discrepancy
                },
                trigger: integration_id.clone(),
                record_ref: Some(record.id.clone()),
                text: format!(
                    "interview said '{}' but video showed '{}'",
                    record.source_claim, record.observed_claim
                ),
                answer_type: AnswerType::OpenText,
                weighted_domain: record.domain.is_diagnostically_weighted(),
            });
        }
        for pattern in pervasiveness_gaps(&analysis.patterns, total_contexts.len()) {
            candidates.push(Candidate {
                category: QuestionCategory::Pervasiveness,
                trigger: integration_id.clone(),
                record_ref: Some(pattern.description.clone()),
                text: format!("does this also happen elsewhere: '{}'", pattern.description),
                answer_type: AnswerType::YesNo,
                weighted_domain: pattern.domain.is_diagnostically_weighted(),
            });
        }

        let mut questions = select_questions(&candidates);
        self.draft_question_wording(case, &mut questions).await?;

        let round = QuestionSet {
            schema_version: QuestionSet::SCHEMA_VERSION.to_string(),
            base: integration_id.clone(),
            questions,
        };
        self.store
            .append_artifact(case, ArtifactKind::ClarificationQuestions, &round, None)?;
        self.transition(
            case,
            Stage::ClarificationPending,
            format!(
                "{} clarification question(s) ready for the parent",
                round.questions.len()
            ),
        )
    }

    /// Second-pass integration after a completed clarification round.
    ///
    /// Not a public entry point: on an Oracle failure here the answer
    /// operations remain callable (they accept `ReIntegrating`) and drive
    /// the round to completion on retry.
    async fn reintegrate(
        &self,
        case: &mut Case,
        round: &QuestionSet,
        answers: Vec<ClarificationAnswer>,
    ) -> Result<Vec<StageEvent>, KinsightError> {
        let head = case
            .latest(ArtifactKind::Integration)
            .map(|r| r.id.clone())
            .ok_or_else(|| KinsightError::Store("no integration analysis on case".to_string()))?;
        if round.base != head {
            return Err(KinsightError::StaleArtifactReference {
                expected: head,
                found: round.base.clone(),
            });
        }

        let interview = self.interview(case)?;
        let base: IntegrationAnalysis = self.store.read_artifact(case, &round.base)?;
        // Oracle work happens before any stage change so a failed call leaves
        // the case where the answer operations can retry it.
        let interpretations = self
            .interpret_answers(case, &base, round, &answers)
            .await?;

        let mut events = vec![self.transition(
            case,
            Stage::ReIntegrating,
            "answers complete; re-integrating",
        )?];
        let records = resolve_with_answers(
            &base.discrepancies,
            &round.questions,
            &answers,
            &interpretations,
        );
        let (patterns, newly_confirmed) =
            confirm_pervasive_from_answers(&base.patterns, &round.questions, &answers);

        let resolved_now = records
            .iter()
            .zip(base.discrepancies.iter())
            .filter(|(after, before)| {
                !before.resolution.is_resolved()
                    && matches!(
                        after.resolution,
                        ResolutionState::ResolvedContextDifference
                            | ResolutionState::ResolvedParentConfirmed
                    )
            })
            .count();
        let unexplained = records
            .iter()
            .filter(|r| r.resolution == ResolutionState::ResolvedContradictionUnexplained)
            .count();
        let (confidence, delta_reason) = update_confidence(
            base.confidence,
            RoundSignals {
                resolved_discrepancies: resolved_now,
                newly_confirmed_pervasive: newly_confirmed,
                unexplained_contradictions: unexplained,
            },
        );
        let contributing_answers = answers
            .iter()
            .filter(|a| !a.is_skipped())
            .map(|a| a.question_id.clone())
            .collect();

        events.extend(
            self.finish_integration(
                case,
                &interview,
                IntegrationInputs {
                    patterns,
                    records,
                    coverage: base.coverage,
                    confidence,
                    delta_reason,
                    predecessor: Some(round.base.clone()),
                    contributing_answers,
                },
            )
            .await?,
        );
        Ok(events)
    }

    async fn draft_narrative(
        &self,
        case: &Case,
        patterns: &[Pattern],
        records: &[kinsight_model::DiscrepancyRecord],
    ) -> Result<String, KinsightError> {
        let response = self
            .oracle
            .invoke(OracleRequest::new(
                case.case_id.clone(),
                TemplateId::Integration,
                json!({
                    "patterns": patterns,
                    "discrepancies": records,
                    "balance": balance(patterns),
                }),
            ))
            .await?;
        let narrative = response.raw["narrative"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(narrative)
    }

    async fn draft_question_wording(
        &self,
        case: &Case,
        questions: &mut [ClarificationQuestion],
    ) -> Result<(), KinsightError> {
        if questions.is_empty() {
            return Ok(());
        }
        let response = self
            .oracle
            .invoke(OracleRequest::new(
                case.case_id.clone(),
                TemplateId::ClarificationDrafting,
                json!({ "questions": &*questions }),
            ))
            .await?;
        let drafted = response.raw["questions"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        for question in questions.iter_mut() {
            let worded = drafted.iter().find(|d| {
                d["id"].as_str() == Some(question.id.0.as_str())
            });
            if let Some(worded) = worded
                && let Some(text) = worded["text"].as_str()
            {
                question.text = text.to_string();
            }
        }
        Ok(())
    }

    async fn interpret_answers(
        &self,
        case: &Case,
        base: &IntegrationAnalysis,
        round: &QuestionSet,
        answers: &[ClarificationAnswer],
    ) -> Result<Vec<AnswerInterpretation>, KinsightError> {
        let answered: Vec<&ClarificationAnswer> =
            answers.iter().filter(|a| !a.is_skipped()).collect();
        if answered.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .oracle
            .invoke(OracleRequest::new(
                case.case_id.clone(),
                TemplateId::ClarificationIntegration,
                json!({
                    "records": base
                        .discrepancies
                        .iter()
                        .filter(|r| !r.resolution.is_resolved())
                        .collect::<Vec<_>>(),
                    "questions": round.questions,
                    "answers": answered,
                }),
            ))
            .await?;
        serde_json::from_value(response.raw["interpretations"].clone()).map_err(|e| {
            KinsightError::OracleContractViolation {
                template: TemplateId::ClarificationIntegration.as_str().to_string(),
                reason: format!("interpretations failed to parse: {e}"),
            }
        })
    }

    fn interview(&self, case: &Case) -> Result<InterviewSummary, KinsightError> {
        let record = case
            .latest(ArtifactKind::Interview)
            .ok_or_else(|| KinsightError::Store("no interview summary on case".to_string()))?;
        self.store.read_artifact(case, &record.id)
    }

    fn video_analyses(
        &self,
        case: &Case,
    ) -> Result<Vec<(ArtifactId, IndividualVideoAnalysis)>, KinsightError> {
        case.all_of(ArtifactKind::VideoAnalysis)
            .into_iter()
            .map(|record| {
                let analysis = self.store.read_artifact(case, &record.id)?;
                Ok((record.id.clone(), analysis))
            })
            .collect()
    }

    fn ledger(&self, case: &Case) -> Result<ConfidenceLedger, KinsightError> {
        match case.latest(ArtifactKind::ConfidenceLedger) {
            None => Ok(ConfidenceLedger::new()),
            Some(record) => self.store.read_artifact(case, &record.id),
        }
    }

    fn open_round(&self, case: &Case) -> Result<QuestionSet, KinsightError> {
        let record = case
            .latest(ArtifactKind::ClarificationQuestions)
            .ok_or_else(|| KinsightError::Store("no open clarification round".to_string()))?;
        self.store.read_artifact(case, &record.id)
    }

    /// Union of answer batches newer than the round's question set; a later
    /// batch wins per question.
    fn collected_answers(&self, case: &Case, round: &QuestionSet) -> Vec<ClarificationAnswer> {
        let Some(round_seq) = case
            .latest(ArtifactKind::ClarificationQuestions)
            .map(|r| r.id.seq())
        else {
            return Vec::new();
        };
        let mut collected: Vec<ClarificationAnswer> = Vec::new();
        for record in case.all_of(ArtifactKind::ClarificationAnswers) {
            if record.id.seq() < round_seq {
                continue;
            }
            let Ok(batch) = self.store.read_artifact::<AnswerBatch>(case, &record.id) else {
                continue;
            };
            for answer in batch.answers {
                collected.retain(|a| a.question_id != answer.question_id);
                collected.push(answer);
            }
        }
        collected.retain(|a| round.questions.iter().any(|q| q.id == a.question_id));
        collected
    }

    fn transition(
        &self,
        case: &mut Case,
        stage: Stage,
        summary: impl Into<String>,
    ) -> Result<StageEvent, KinsightError> {
        case.current_stage = stage;
        self.store.save_head(case)?;
        let event = StageEvent::new(case.case_id.clone(), stage, summary);
        info!(case = %case.case_id, stage = %stage, "stage transition");
        Ok(event)
    }
}

struct IntegrationInputs {
    patterns: Vec<Pattern>,
    records: Vec<kinsight_model::DiscrepancyRecord>,
    coverage: Coverage,
    confidence: Confidence,
    delta_reason: String,
    predecessor: Option<ArtifactId>,
    contributing_answers: Vec<QuestionId>,
}

fn require_stage(case: &Case, allowed: &[Stage], operation: &str) -> Result<(), KinsightError> {
    if allowed.contains(&case.current_stage) {
        Ok(())
    } else {
        Err(KinsightError::InvalidTransition {
            from: case.current_stage,
            operation: operation.to_string(),
        })
    }
}

fn find_guideline<'a>(
    interview: &'a InterviewSummary,
    guideline_id: &GuidelineId,
) -> Result<&'a VideoGuideline, KinsightError> {
    interview
        .video_guidelines
        .iter()
        .find(|g| &g.id == guideline_id)
        .ok_or_else(|| {
            KinsightError::MalformedSubmission(format!(
                "unknown filming guideline '{}'",
                guideline_id.0
            ))
        })
}

async fn run_video_analysis(
    oracle: &dyn Oracle,
    case_id: &CaseId,
    guideline: &VideoGuideline,
    concerns: &[kinsight_model::ReportedConcern],
    evidence: serde_json::Value,
) -> Result<IndividualVideoAnalysis, KinsightError> {
    let response = oracle
        .invoke(OracleRequest::new(
            case_id.clone(),
            TemplateId::VideoAnalysis,
            json!({
                "guideline": guideline,
                "concerns": concerns,
                "evidence": evidence,
            }),
        ))
        .await?;

    let parse = |value: serde_json::Value| -> Result<IndividualVideoAnalysis, serde_json::Error> {
        Ok(IndividualVideoAnalysis {
            schema_version: IndividualVideoAnalysis::SCHEMA_VERSION.to_string(),
            guideline_id: guideline.id.clone(),
            context: guideline.context.clone(),
            observations: serde_json::from_value(value["observations"].clone())?,
            strengths: serde_json::from_value(value["strengths"].clone())?,
            coverage: serde_json::from_value(value["coverage"].clone())?,
        })
    };
    parse(response.raw).map_err(|e| KinsightError::OracleContractViolation {
        template: TemplateId::VideoAnalysis.as_str().to_string(),
        reason: format!("analysis failed to parse: {e}"),
    })
}

/// Coverage is full when every guideline is either analyzed with usable
/// footage or explicitly declined, and at least one analysis exists.
/// Declined guidelines count as addressed so a firm parent "no more" cannot
/// livelock the gate; the gap is carried as a limitation instead.
fn compute_coverage(
    interview: &InterviewSummary,
    case: &Case,
    analyses: &[(ArtifactId, IndividualVideoAnalysis)],
) -> Coverage {
    if analyses.is_empty() {
        return Coverage::Partial;
    }
    let usable: BTreeSet<&GuidelineId> = analyses
        .iter()
        .filter(|(_, a)| a.coverage != kinsight_model::CoverageVerdict::NotCaptured)
        .map(|(_, a)| &a.guideline_id)
        .collect();
    let all_addressed = interview.video_guidelines.iter().all(|g| {
        usable.contains(&g.id) || case.declined_guidelines.contains(&g.id)
    });
    if all_addressed {
        Coverage::Full
    } else {
        Coverage::Partial
    }
}

/// Unresolved count the gate sees: open records plus explained-away-as-
/// nothing contradictions, which stay blocking until confidence carries them.
fn unresolved_blocking(records: &[kinsight_model::DiscrepancyRecord]) -> usize {
    records
        .iter()
        .filter(|r| {
            matches!(
                r.resolution,
                ResolutionState::Unresolved | ResolutionState::ResolvedContradictionUnexplained
            )
        })
        .count()
}

fn collect_limitations(
    case: &Case,
    interview: &InterviewSummary,
    records: &[kinsight_model::DiscrepancyRecord],
) -> Vec<String> {
    let mut limitations = Vec::new();
    for guideline in &interview.video_guidelines {
        if case.declined_guidelines.contains(&guideline.id) {
            limitations.push(format!(
                "no footage for guideline '{}': {}",
                guideline.id.0, guideline.instruction
            ));
        }
    }
    for record in records {
        match record.resolution {
            ResolutionState::Unresolved => limitations.push(format!(
                "unresolved discrepancy in {:?}: {}",
                record.domain, record.observed_claim
            )),
            ResolutionState::ResolvedContradictionUnexplained => limitations.push(format!(
                "unexplained contradiction in {:?}: {}",
                record.domain, record.observed_claim
            )),
            _ => {}
        }
    }
    limitations
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinsight_model::{CoverageVerdict, Domain, Observation, Polarity};

    fn case_with_stage(stage: Stage) -> Case {
        let mut case = Case::new(CaseId::new("case-t").unwrap(), "child");
        case.current_stage = stage;
        case
    }

    #[test]
    fn stage_guard_rejects_wrong_stage() {
        let case = case_with_stage(Stage::ReportReady);
        let err = require_stage(&case, &[Stage::AwaitingInterview], "submit_interview")
            .unwrap_err();
        assert!(matches!(
            err,
            KinsightError::InvalidTransition {
                from: Stage::ReportReady,
                ..
            }
        ));
    }

    #[test]
    fn coverage_partial_without_any_analysis() {
        let interview = InterviewSummary::new(vec![], vec![], vec![]);
        let case = case_with_stage(Stage::Integrating);
        assert_eq!(compute_coverage(&interview, &case, &[]), Coverage::Partial);
    }

    #[test]
    fn declined_guideline_counts_as_addressed() {
        let guideline = |id: &str| VideoGuideline {
            id: GuidelineId(id.to_string()),
            rationale: "observe play".into(),
            instruction: "film free play".into(),
            expected_indicators: vec![],
            context: kinsight_model::ObservationContext::Home,
        };
        let interview =
            InterviewSummary::new(vec![], vec![], vec![guideline("g-1"), guideline("g-2")]);
        let analysis = IndividualVideoAnalysis {
            schema_version: IndividualVideoAnalysis::SCHEMA_VERSION.to_string(),
            guideline_id: GuidelineId("g-1".into()),
            context: kinsight_model::ObservationContext::Home,
            observations: vec![Observation {
                text: "plays alone".into(),
                domain: Domain::PeerInteraction,
                polarity: Polarity::Challenge,
                frequency: None,
                evidence_ref: None,
            }],
            strengths: vec!["focused".into(), "calm".into()],
            coverage: CoverageVerdict::Captured,
        };
        let analyses = vec![(ArtifactId::new(ArtifactKind::VideoAnalysis, 2), analysis)];

        let mut case = case_with_stage(Stage::Integrating);
        assert_eq!(
            compute_coverage(&interview, &case, &analyses),
            Coverage::Partial
        );
        case.declined_guidelines.push(GuidelineId("g-2".into()));
        assert_eq!(
            compute_coverage(&interview, &case, &analyses),
            Coverage::Full
        );
    }

    #[test]
    fn unexplained_contradictions_stay_blocking() {
        let record = |resolution| kinsight_model::DiscrepancyRecord {
            id: "d-1".into(),
            domain: Domain::EyeContact,
            source_claim: "always looks at me".into(),
            observed_claim: "avoids eye contact".into(),
            resolution,
            resolution_text: None,
        };
        assert_eq!(unresolved_blocking(&[record(ResolutionState::Unresolved)]), 1);
        assert_eq!(
            unresolved_blocking(&[record(ResolutionState::ResolvedContradictionUnexplained)]),
            1
        );
        assert_eq!(
            unresolved_blocking(&[record(ResolutionState::ResolvedContextDifference)]),
            0
        );
    }
}
