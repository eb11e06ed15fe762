use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    Cache,
    Provider,
    Template,
}

impl FeedbackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackSource::Cache => "cache",
            FeedbackSource::Provider => "provider",
            FeedbackSource::Template => "template",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub text: String,
    pub source: FeedbackSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPath {
    /// Score and feedback both came from one provider call.
    Joint,
    /// Deterministic score plus the feedback generator chain.
    Fallback,
}

/// Result of `evaluate_with_llm`: always carries a usable score and feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub feedback: String,
    pub path: EvaluationPath,
    pub feedback_source: FeedbackSource,
}
