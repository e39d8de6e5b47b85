use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "es";

/// Bearer token of the submitting user.
///
/// Carried through the workflow for the persistence layer only. Never parsed,
/// never logged, never written to checkpoints.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UserToken(String);

impl UserToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for UserToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserToken({})", crate::sanitize::redact_token(&self.0))
    }
}

/// The record threaded through both stages.
///
/// Stages take the state by value and hand back the updated state. They only
/// overwrite fields; nothing is ever removed. A non-blank `error_message` is
/// the one signal that stops the workflow early.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub raw_text: String,
    pub doc_type: String,
    pub language: String,
    pub simplified_explanation: String,
    pub identified_risks: Vec<String>,
    pub action_items: Vec<String>,
    pub confidence_score: f64,
    pub error_message: String,
    pub thread_id: String,
    #[serde(skip)]
    pub user_token: UserToken,
}

impl WorkflowState {
    /// Entry state for a fresh submission: empty text fields, full confidence.
    pub fn new(raw_text: impl Into<String>, thread_id: impl Into<String>, user_token: UserToken) -> Self {
        Self {
            raw_text: raw_text.into(),
            doc_type: String::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            simplified_explanation: String::new(),
            identified_risks: Vec::new(),
            action_items: Vec::new(),
            confidence_score: 1.0,
            error_message: String::new(),
            thread_id: thread_id.into(),
            user_token,
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.trim().is_empty()
    }

    pub fn set_confidence(&mut self, score: f64) {
        self.confidence_score = if score.is_nan() {
            0.0
        } else {
            score.clamp(0.0, 1.0)
        };
    }

    /// Terminal stage-1 failure: the classification fields are reset and the
    /// run is marked as rejected.
    pub fn fail_classification(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self.doc_type = String::new();
        self.language = DEFAULT_LANGUAGE.to_string();
        self.set_confidence(0.0);
        self
    }

    pub fn apply_classification(mut self, doc_type: String, language: String) -> Self {
        self.doc_type = doc_type;
        self.language = language;
        self.error_message = String::new();
        self
    }

    pub fn apply_analysis(
        mut self,
        simplified_explanation: String,
        identified_risks: Vec<String>,
        action_items: Vec<String>,
    ) -> Self {
        self.simplified_explanation = simplified_explanation;
        self.identified_risks = identified_risks;
        self.action_items = action_items;
        self
    }
}
