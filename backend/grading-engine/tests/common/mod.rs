#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grading_engine::{
    config::Config,
    models::{Question, QuestionType},
    services::{
        feedback_cache::{CacheError, FeedbackCache, InMemoryFeedbackCache},
        provider::{ProviderError, TextProvider},
        rules::default_rules,
        GradingEngine,
    },
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.provider.timeout_ms = 200;
    config
}

/// Engine with the built-in rules, the given provider and an in-memory cache.
pub fn engine_with(provider: Option<Arc<dyn TextProvider>>) -> GradingEngine {
    init_tracing();
    GradingEngine::new(
        &test_config(),
        default_rules().clone(),
        provider,
        Arc::new(InMemoryFeedbackCache::default()),
    )
}

pub fn engine_with_cache(
    provider: Option<Arc<dyn TextProvider>>,
    cache: Arc<dyn FeedbackCache>,
) -> GradingEngine {
    init_tracing();
    GradingEngine::new(&test_config(), default_rules().clone(), provider, cache)
}

pub fn multiple_choice(correct: &str) -> Question {
    Question::new(101, QuestionType::MultipleChoice, "lists", correct).with_choices(&[
        "A) tuple",
        "B) list",
        "C) set",
        "D) dict",
    ])
}

pub fn short_answer(topic: &str, correct: &str) -> Question {
    Question::new(102, QuestionType::ShortAnswer, topic, correct)
}

pub fn code_completion(correct: &str, keywords: &[&str]) -> Question {
    Question::new(103, QuestionType::CodeCompletion, "lists", correct)
        .with_required_keywords(keywords)
}

pub fn debug_code(correct: &str, bugs: &[&str]) -> Question {
    Question::new(104, QuestionType::DebugCode, "loops", correct)
        .with_code_snippet("for i in rnage(10)\n    print(i)")
        .with_bugs(bugs)
}

pub fn true_false(topic: &str, correct: &str) -> Question {
    Question::new(105, QuestionType::TrueFalse, topic, correct)
}

/// Provider that answers with fixed text and counts its calls.
pub struct CountingProvider {
    reply: String,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextProvider for CountingProvider {
    fn name(&self) -> &str {
        "counting"
    }

    async fn generate(&self, _: &str, _: &str, _: u32) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Provider that always fails the way a broken upstream does.
pub struct FailingProvider;

#[async_trait]
impl TextProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _: &str, _: &str, _: u32) -> Result<String, ProviderError> {
        Err(ProviderError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

/// Provider that returns an empty string.
pub struct EmptyProvider;

#[async_trait]
impl TextProvider for EmptyProvider {
    fn name(&self) -> &str {
        "empty"
    }

    async fn generate(&self, _: &str, _: &str, _: u32) -> Result<String, ProviderError> {
        Ok(String::new())
    }
}

/// Provider that never answers within the engine timeout.
pub struct HangingProvider;

#[async_trait]
impl TextProvider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate(&self, _: &str, _: &str, _: u32) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late to matter".to_string())
    }
}

/// Cache whose backend is always down.
pub struct BrokenCache;

#[async_trait]
impl FeedbackCache for BrokenCache {
    async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Serialization("backend down".to_string()))
    }

    async fn set(&self, _: &str, _: &str) -> Result<(), CacheError> {
        Err(CacheError::Serialization("backend down".to_string()))
    }
}
