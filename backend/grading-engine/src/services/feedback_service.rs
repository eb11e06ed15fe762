use std::sync::Arc;
use std::time::Duration;

use crate::metrics::{record_cache_hit, record_cache_miss, FEEDBACK_GENERATED_TOTAL};
use crate::models::{FeedbackOutcome, FeedbackSource, Question};

use super::feedback_cache::{cache_key, FeedbackCache};
use super::normalizer::normalize;
use super::prompts::{feedback_prompt, FEEDBACK_MAX_TOKENS};
use super::provider::{call_provider, TextProvider};
use super::rules::RuleSet;
use super::template_feedback;

/// Feedback text for a graded answer: cache, then provider, then templates.
pub struct FeedbackService {
    rules: Arc<RuleSet>,
    provider: Option<Arc<dyn TextProvider>>,
    cache: Arc<dyn FeedbackCache>,
    timeout: Duration,
    min_chars: usize,
}

impl FeedbackService {
    pub fn new(
        rules: Arc<RuleSet>,
        provider: Option<Arc<dyn TextProvider>>,
        cache: Arc<dyn FeedbackCache>,
        timeout: Duration,
        min_chars: usize,
    ) -> Self {
        Self {
            rules,
            provider,
            cache,
            timeout,
            min_chars,
        }
    }

    pub fn provider(&self) -> Option<&dyn TextProvider> {
        self.provider.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub async fn generate(
        &self,
        question: &Question,
        user_answer: &str,
        score: f64,
        user_id: Option<&str>,
    ) -> String {
        self.generate_with_source(question, user_answer, score, user_id)
            .await
            .text
    }

    pub async fn generate_with_source(
        &self,
        question: &Question,
        user_answer: &str,
        score: f64,
        user_id: Option<&str>,
    ) -> FeedbackOutcome {
        let key = cache_key(
            question.id,
            question.question_type,
            &normalize(&self.rules, user_answer),
            user_id,
        );

        // 1. Try cache first
        match self.cache.get(&key).await {
            Ok(Some(cached)) if !cached.trim().is_empty() => {
                record_cache_hit();
                tracing::debug!("Feedback found in cache for question={}", question.id);
                return self.outcome(cached, FeedbackSource::Cache);
            }
            Ok(_) => record_cache_miss(),
            Err(e) => {
                record_cache_miss();
                tracing::warn!(
                    "Feedback cache read failed for question={}, treating as miss: {}",
                    question.id,
                    e
                );
            }
        }

        // 2. Try the text-generation provider (single call, no engine-side retry)
        if self.provider.is_some() {
            let prompt = feedback_prompt(question, user_answer, score);
            match call_provider(
                self.provider(),
                &prompt.system,
                &prompt.user,
                FEEDBACK_MAX_TOKENS,
                self.timeout,
                self.min_chars,
            )
            .await
            {
                Ok(text) => {
                    if let Err(e) = self.cache.set(&key, &text).await {
                        tracing::warn!(
                            "Failed to cache feedback for question={}: {}",
                            question.id,
                            e
                        );
                    }
                    tracing::debug!("Feedback generated by provider for question={}", question.id);
                    return self.outcome(text, FeedbackSource::Provider);
                }
                Err(e) => {
                    tracing::warn!(
                        "Provider feedback failed for question={}, using template: {}",
                        question.id,
                        e
                    );
                }
            }
        } else {
            tracing::debug!(
                "No text-generation provider configured; template feedback for question={}",
                question.id
            );
        }

        // 3. Deterministic template
        let text = template_feedback::render(&self.rules, question, user_answer, score);
        self.outcome(text, FeedbackSource::Template)
    }

    fn outcome(&self, text: String, source: FeedbackSource) -> FeedbackOutcome {
        FEEDBACK_GENERATED_TOTAL
            .with_label_values(&[source.as_str()])
            .inc();
        FeedbackOutcome { text, source }
    }
}
