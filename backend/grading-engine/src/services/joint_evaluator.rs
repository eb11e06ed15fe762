use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::metrics::{JOINT_EVALUATIONS_TOTAL, JOINT_SCORE_DIVERGENCE_TOTAL};
use crate::models::{
    AiJointResult, Evaluation, EvaluationPath, FeedbackSource, Question, ScoreTier,
};

use super::dispatcher;
use super::feedback_service::FeedbackService;
use super::prompts::{joint_prompt, JOINT_MAX_TOKENS};
use super::provider::call_provider;
use super::rules::RuleSet;

const JOINT_SCORES: [f64; 3] = [0.0, 0.5, 1.0];
/// Joint and deterministic scores may differ by this many tiers before it is reported.
const MAX_TIER_DIVERGENCE: usize = 1;

#[derive(Debug, Error)]
pub enum JointParseError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("score {0} is not one of 0, 0.5, 1")]
    ScoreOutOfRange(f64),
    #[error("feedback is empty")]
    EmptyFeedback,
}

#[derive(Debug, Deserialize)]
struct RawJointResponse {
    score: f64,
    #[serde(default)]
    feedback: String,
}

/// Extracts JSON from a model response, handling fenced blocks and surrounding prose.
fn extract_json_from_response(content: &str) -> &str {
    if let Some(start) = content.find("```json") {
        let json_start = start + 7;
        if let Some(end) = content[json_start..].find("```") {
            return content[json_start..json_start + end].trim();
        }
    }

    if let Some(start) = content.find("```") {
        let json_start = start + 3;
        if let Some(end) = content[json_start..].find("```") {
            let candidate = content[json_start..json_start + end].trim();
            if candidate.starts_with('{') {
                return candidate;
            }
        }
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if end > start {
            return &content[start..=end];
        }
    }

    content.trim()
}

/// Parses `{"score": 0|0.5|1, "feedback": "..."}` and rejects anything else.
pub fn parse_joint_response(content: &str) -> Result<AiJointResult, JointParseError> {
    let raw: RawJointResponse = serde_json::from_str(extract_json_from_response(content))?;

    let score = JOINT_SCORES
        .iter()
        .copied()
        .find(|allowed| (allowed - raw.score).abs() < 1e-9)
        .ok_or(JointParseError::ScoreOutOfRange(raw.score))?;

    let feedback = raw.feedback.trim();
    if feedback.is_empty() {
        return Err(JointParseError::EmptyFeedback);
    }

    Ok(AiJointResult {
        score,
        feedback: feedback.to_string(),
    })
}

/// True when two scores sit more than one partial-credit tier apart.
pub fn diverges(ai_score: f64, deterministic_score: f64) -> bool {
    let ai = ScoreTier::nearest(ai_score).index();
    let det = ScoreTier::nearest(deterministic_score).index();
    ai.abs_diff(det) > MAX_TIER_DIVERGENCE
}

/// One-call score-and-explain path with a deterministic fallback chain.
pub struct JointEvaluator {
    rules: Arc<RuleSet>,
    feedback: Arc<FeedbackService>,
}

impl JointEvaluator {
    pub fn new(rules: Arc<RuleSet>, feedback: Arc<FeedbackService>) -> Self {
        Self { rules, feedback }
    }

    pub async fn evaluate(&self, question: &Question, user_answer: &str) -> Evaluation {
        let deterministic = dispatcher::score(&self.rules, question, user_answer);

        match self.try_joint(question, user_answer).await {
            Ok(result) => {
                if diverges(result.score, deterministic) {
                    JOINT_SCORE_DIVERGENCE_TOTAL.inc();
                    tracing::warn!(
                        "Joint score diverges from deterministic grading: question={}, type={}, ai={}, deterministic={}",
                        question.id,
                        question.question_type,
                        result.score,
                        deterministic
                    );
                }
                JOINT_EVALUATIONS_TOTAL.with_label_values(&["joint"]).inc();
                Evaluation {
                    score: result.score,
                    feedback: result.feedback,
                    path: EvaluationPath::Joint,
                    feedback_source: FeedbackSource::Provider,
                }
            }
            Err(reason) => {
                tracing::warn!(
                    "Joint evaluation unavailable for question={}, falling back: {}",
                    question.id,
                    reason
                );
                JOINT_EVALUATIONS_TOTAL.with_label_values(&["fallback"]).inc();

                let outcome = self
                    .feedback
                    .generate_with_source(question, user_answer, deterministic, None)
                    .await;
                Evaluation {
                    score: deterministic,
                    feedback: outcome.text,
                    path: EvaluationPath::Fallback,
                    feedback_source: outcome.source,
                }
            }
        }
    }

    async fn try_joint(
        &self,
        question: &Question,
        user_answer: &str,
    ) -> anyhow::Result<AiJointResult> {
        let prompt = joint_prompt(question, user_answer);
        let text = call_provider(
            self.feedback.provider(),
            &prompt.system,
            &prompt.user,
            JOINT_MAX_TOKENS,
            self.feedback.timeout(),
            self.feedback.min_chars(),
        )
        .await?;
        Ok(parse_joint_response(&text)?)
    }
}
