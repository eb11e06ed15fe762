use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::metrics::GRADES_TOTAL;
use crate::models::{
    Evaluation, FeedbackOutcome, GradeResult, GradingInput, Question, TopicStat,
};

use feedback_cache::{FeedbackCache, InMemoryFeedbackCache, RedisFeedbackCache};
use feedback_service::FeedbackService;
use joint_evaluator::JointEvaluator;
use provider::{TextProvider, YandexGptProvider};
use rules::RuleSet;

/// Grading and feedback entry points shared by the submission and reporting layers.
pub struct GradingEngine {
    rules: Arc<RuleSet>,
    feedback: Arc<FeedbackService>,
    joint: JointEvaluator,
}

impl GradingEngine {
    pub fn new(
        config: &Config,
        rules: RuleSet,
        provider: Option<Arc<dyn TextProvider>>,
        cache: Arc<dyn FeedbackCache>,
    ) -> Self {
        let rules = Arc::new(rules);
        let feedback = Arc::new(FeedbackService::new(
            rules.clone(),
            provider,
            cache,
            config.provider.timeout(),
            config.feedback_min_chars,
        ));
        let joint = JointEvaluator::new(rules.clone(), feedback.clone());
        Self {
            rules,
            feedback,
            joint,
        }
    }

    /// Builds rules, provider and cache from configuration. A Redis cache that
    /// cannot be reached is replaced by the in-process cache.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let rules = RuleSet::load(config.rules_path.as_deref())?;

        let provider: Option<Arc<dyn TextProvider>> = if config.provider.is_usable() {
            tracing::info!("Text-generation provider enabled: {}", config.provider.model);
            Some(Arc::new(YandexGptProvider::new(config.provider.clone())?))
        } else {
            tracing::info!("Text-generation provider disabled; template feedback only");
            None
        };

        let cache: Arc<dyn FeedbackCache> = match &config.cache.redis_uri {
            Some(uri) => match RedisFeedbackCache::connect(&config.cache, uri).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => {
                    tracing::warn!("Redis feedback cache unavailable, using in-memory cache: {}", e);
                    Arc::new(InMemoryFeedbackCache::from_settings(&config.cache))
                }
            },
            None => Arc::new(InMemoryFeedbackCache::from_settings(&config.cache)),
        };

        Ok(Self::new(config, rules, provider, cache))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn score_answer(&self, question: &Question, user_answer: &str) -> f64 {
        GRADES_TOTAL
            .with_label_values(&[question.question_type.as_str()])
            .inc();
        dispatcher::score(&self.rules, question, user_answer)
    }

    pub fn grade(&self, question: &Question, user_answer: &str) -> GradeResult {
        GRADES_TOTAL
            .with_label_values(&[question.question_type.as_str()])
            .inc();
        dispatcher::grade(&self.rules, question, user_answer)
    }

    pub fn grade_batch(&self, inputs: &[GradingInput]) -> Vec<GradeResult> {
        inputs
            .iter()
            .map(|input| self.grade(&input.question, &input.raw_answer))
            .collect()
    }

    pub async fn generate_ai_feedback(
        &self,
        question: &Question,
        user_answer: &str,
        score: f64,
        user_id: Option<&str>,
    ) -> String {
        self.feedback
            .generate(question, user_answer, score, user_id)
            .await
    }

    pub async fn generate_feedback_with_source(
        &self,
        question: &Question,
        user_answer: &str,
        score: f64,
        user_id: Option<&str>,
    ) -> FeedbackOutcome {
        self.feedback
            .generate_with_source(question, user_answer, score, user_id)
            .await
    }

    pub async fn evaluate_with_llm(&self, question: &Question, user_answer: &str) -> Evaluation {
        self.joint.evaluate(question, user_answer).await
    }

    pub fn analyze_by_topic(&self, results: &[GradeResult]) -> HashMap<String, TopicStat> {
        topic_aggregator::analyze_by_topic(results)
    }
}

pub mod dispatcher;
pub mod feedback_cache;
pub mod feedback_service;
pub mod graders;
pub mod joint_evaluator;
pub mod normalizer;
pub mod prompts;
pub mod provider;
pub mod rules;
pub mod similarity;
pub mod syntax;
pub mod template_feedback;
pub mod topic_aggregator;
