//! The two model-backed stages.
//!
//! A stage never fails outright: every problem is written into the returned
//! state and reported through [`StageOutcome`] so the engine can log and
//! route on it.

use std::sync::Arc;

use log::{debug, info, warn};
use tracing::{info_span, Instrument};

use crate::llm::ModelClient;
use crate::sanitize;

use super::gate::{QualityCheck, TextQualityGate};
use super::parser::{parse_analysis, parse_classification};
use super::prompts;
use super::state::WorkflowState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageFailure {
    /// The gate rejected the text before any model call.
    InputQualityRejected(QualityCheck),
    ClassificationFailed(String),
    /// Analysis fell back to the generic content.
    AnalysisFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed,
    /// The stage saw an error from an earlier stage and left the state alone.
    Skipped,
    Failed(StageFailure),
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed)
    }
}

/// Gate, then classify with the small model.
pub struct ClassifyStage {
    model: Arc<dyn ModelClient>,
    gate: TextQualityGate,
}

impl ClassifyStage {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            gate: TextQualityGate::default(),
        }
    }

    pub fn with_gate(mut self, gate: TextQualityGate) -> Self {
        self.gate = gate;
        self
    }

    pub async fn run(&self, state: WorkflowState) -> (WorkflowState, StageOutcome) {
        let span = info_span!(
            "classify",
            thread_id = %state.thread_id,
            text_hash = %sanitize::hash_text(&state.raw_text),
            text_chars = state.raw_text.chars().count(),
        );
        self.classify(state).instrument(span).await
    }

    async fn classify(&self, state: WorkflowState) -> (WorkflowState, StageOutcome) {
        let verdict = self.gate.evaluate(&state.raw_text);
        if let Some(check) = verdict.failed_check {
            info!(
                "Rejected extracted text ({:?}): {}",
                check,
                sanitize::preview(&state.raw_text)
            );
            return (
                state.fail_classification(verdict.reason),
                StageOutcome::Failed(StageFailure::InputQualityRejected(check)),
            );
        }

        let message = prompts::classify_message(&state.raw_text);
        let response = match self
            .model
            .complete(
                prompts::CLASSIFY_SYSTEM,
                &message,
                prompts::CLASSIFY_TEMPERATURE,
            )
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Classification call failed: {}", e);
                return (
                    state.fail_classification(prompts::CLASSIFICATION_FAILED_MESSAGE),
                    StageOutcome::Failed(StageFailure::ClassificationFailed(e.to_string())),
                );
            }
        };

        let classification = parse_classification(&response);
        info!(
            "Classified document as '{}' (category: {:?}, language: {})",
            classification.doc_type, classification.category, classification.language
        );

        (
            state.apply_classification(classification.doc_type, classification.language),
            StageOutcome::Completed,
        )
    }
}

/// Simplify the document and extract risks and next steps with the large model.
pub struct AnalyzeStage {
    model: Arc<dyn ModelClient>,
}

impl AnalyzeStage {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    pub async fn run(&self, state: WorkflowState) -> (WorkflowState, StageOutcome) {
        if state.has_error() {
            debug!(
                "Skipping analysis for thread {}: earlier stage failed",
                state.thread_id
            );
            return (state, StageOutcome::Skipped);
        }

        let span = info_span!(
            "analyze",
            thread_id = %state.thread_id,
            doc_type = %state.doc_type,
            language = %state.language,
        );
        self.analyze(state).instrument(span).await
    }

    async fn analyze(&self, state: WorkflowState) -> (WorkflowState, StageOutcome) {
        let message =
            prompts::analyze_message(&state.doc_type, &state.language, &state.raw_text);

        match self
            .model
            .complete(prompts::ANALYZE_SYSTEM, &message, prompts::ANALYZE_TEMPERATURE)
            .await
        {
            Ok(response) => {
                let analysis = parse_analysis(&response);
                info!(
                    "Analysis parsed: {} risks, {} actions",
                    analysis.identified_risks.len(),
                    analysis.action_items.len()
                );
                (
                    state.apply_analysis(
                        analysis.simplified_explanation,
                        analysis.identified_risks,
                        analysis.action_items,
                    ),
                    StageOutcome::Completed,
                )
            }
            Err(e) => {
                warn!("Analysis call failed, using fallback content: {}", e);
                let mut state = state.apply_analysis(
                    prompts::ANALYSIS_FAILED_EXPLANATION.to_string(),
                    vec![prompts::ANALYSIS_FAILED_RISK.to_string()],
                    vec![prompts::ANALYSIS_FAILED_ACTION.to_string()],
                );
                state.set_confidence(0.0);
                (
                    state,
                    StageOutcome::Failed(StageFailure::AnalysisFailed(e.to_string())),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::fakes::{FakeModel, GOOD_TEXT};
    use crate::workflow::state::UserToken;

    const CLASSIFICATION: &str = "TIPO: Contrato de arrendamiento\nCATEGORÍA: LEGAL\nIDIOMA: es";
    const ANALYSIS: &str = "RESUMEN:\n1. Uno.\n2. Dos.\n3. Tres.\nLETRA CHICA / RIESGOS:\n- Riesgo A\n- Riesgo B\nPRÓXIMOS PASOS:\n- Acción";

    fn state(text: &str) -> WorkflowState {
        WorkflowState::new(text, "user_42_ab12cd", UserToken::new("token"))
    }

    #[tokio::test]
    async fn test_classify_sets_type_and_language() {
        let model = Arc::new(FakeModel::replying(CLASSIFICATION));
        let stage = ClassifyStage::new(model.clone());

        let (out, outcome) = stage.run(state(GOOD_TEXT)).await;

        assert_eq!(outcome, StageOutcome::Completed);
        assert_eq!(out.doc_type, "Contrato de arrendamiento");
        assert_eq!(out.language, "es");
        assert_eq!(out.error_message, "");
        assert_eq!(out.confidence_score, 1.0);
        assert_eq!(model.calls(), 1);
        assert_eq!(model.temperatures(), vec![prompts::CLASSIFY_TEMPERATURE]);
    }

    #[tokio::test]
    async fn test_gate_rejection_skips_model() {
        let model = Arc::new(FakeModel::replying(CLASSIFICATION));
        let stage = ClassifyStage::new(model.clone());

        let (out, outcome) = stage.run(state("hola")).await;

        assert_eq!(
            outcome,
            StageOutcome::Failed(StageFailure::InputQualityRejected(QualityCheck::TooShort))
        );
        assert_eq!(out.error_message, QualityCheck::TooShort.reason());
        assert_eq!(out.doc_type, "");
        assert_eq!(out.language, "es");
        assert_eq!(out.confidence_score, 0.0);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_classification_failure_sets_generic_message() {
        let model = Arc::new(FakeModel::failing());
        let stage = ClassifyStage::new(model.clone());

        let (out, outcome) = stage.run(state(GOOD_TEXT)).await;

        assert!(matches!(
            outcome,
            StageOutcome::Failed(StageFailure::ClassificationFailed(_))
        ));
        assert_eq!(out.error_message, prompts::CLASSIFICATION_FAILED_MESSAGE);
        assert_eq!(out.doc_type, "");
        assert_eq!(out.confidence_score, 0.0);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_classify_is_idempotent() {
        let model = Arc::new(FakeModel::replying(CLASSIFICATION));
        let stage = ClassifyStage::new(model.clone());

        let (first, _) = stage.run(state(GOOD_TEXT)).await;
        let (second, _) = stage.run(state(GOOD_TEXT)).await;

        assert_eq!(first.doc_type, second.doc_type);
        assert_eq!(first.language, second.language);
        assert_eq!(first.error_message, second.error_message);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_classify_clears_stale_error() {
        let model = Arc::new(FakeModel::replying(CLASSIFICATION));
        let stage = ClassifyStage::new(model);
        let mut input = state(GOOD_TEXT);
        input.error_message = "   ".to_string();

        let (out, outcome) = stage.run(input).await;

        assert!(outcome.is_completed());
        assert_eq!(out.error_message, "");
    }

    #[tokio::test]
    async fn test_custom_gate_is_used() {
        let model = Arc::new(FakeModel::replying(CLASSIFICATION));
        let gate = TextQualityGate {
            min_chars: 5,
            min_words: 2,
            min_distinct_words: 1,
            ..TextQualityGate::default()
        };
        let stage = ClassifyStage::new(model.clone()).with_gate(gate);

        let (_, outcome) = stage.run(state("Multa de tráfico")).await;

        assert!(outcome.is_completed());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_parses_sections() {
        let model = Arc::new(FakeModel::replying(ANALYSIS));
        let stage = AnalyzeStage::new(model.clone());
        let mut input = state(GOOD_TEXT);
        input.doc_type = "Contrato".to_string();

        let (out, outcome) = stage.run(input).await;

        assert_eq!(outcome, StageOutcome::Completed);
        assert_eq!(out.simplified_explanation.lines().count(), 3);
        assert_eq!(out.identified_risks, vec!["Riesgo A", "Riesgo B"]);
        assert_eq!(out.action_items, vec!["Acción"]);
        assert_eq!(out.doc_type, "Contrato");
        assert_eq!(model.temperatures(), vec![prompts::ANALYZE_TEMPERATURE]);
    }

    #[tokio::test]
    async fn test_analyze_is_identity_on_error() {
        let model = Arc::new(FakeModel::replying(ANALYSIS));
        let stage = AnalyzeStage::new(model.clone());
        let mut input = state(GOOD_TEXT);
        input.error_message = "x".to_string();

        let (out, outcome) = stage.run(input.clone()).await;

        assert_eq!(outcome, StageOutcome::Skipped);
        assert_eq!(out, input);
        assert_eq!(out.user_token, input.user_token);
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_failure_uses_fallback_content() {
        let model = Arc::new(FakeModel::failing());
        let stage = AnalyzeStage::new(model);
        let mut input = state(GOOD_TEXT);
        input.identified_risks = vec!["viejo".to_string(), "otro".to_string()];

        let (out, outcome) = stage.run(input).await;

        assert!(matches!(
            outcome,
            StageOutcome::Failed(StageFailure::AnalysisFailed(_))
        ));
        assert_eq!(out.simplified_explanation, prompts::ANALYSIS_FAILED_EXPLANATION);
        assert_eq!(out.identified_risks, vec![prompts::ANALYSIS_FAILED_RISK]);
        assert_eq!(out.action_items, vec![prompts::ANALYSIS_FAILED_ACTION]);
        assert_eq!(out.confidence_score, 0.0);
        assert_eq!(out.error_message, "");
    }
}
