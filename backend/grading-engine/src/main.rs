use std::collections::HashMap;
use std::io::Read;

use anyhow::Context;
use clap::Parser;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grading_engine::{
    config::Config,
    models::{FeedbackSource, GradeResult, GradingInput, TopicStat},
    services::{topic_aggregator::weak_topics, GradingEngine},
};

const WEAK_TOPIC_THRESHOLD: f64 = 60.0;
/// Provider calls in flight at once when feedback is requested.
const FEEDBACK_CONCURRENCY: usize = 4;

/// Grades a batch of submissions and prints a JSON report.
#[derive(Parser, Debug)]
#[command(name = "grading-engine", version, about)]
struct Options {
    /// JSON array of grading inputs; `-` or nothing reads stdin
    input: Option<String>,
    /// Attach feedback to every result
    #[arg(long)]
    feedback: bool,
    /// Score and explain each answer in one provider call
    #[arg(long)]
    joint: bool,
    /// Print Prometheus metrics to stderr when done
    #[arg(long)]
    metrics: bool,
}

impl Options {
    fn input_path(&self) -> Option<&str> {
        self.input.as_deref().filter(|path| *path != "-")
    }
}

#[derive(Debug, Serialize)]
struct SubmissionReport {
    #[serde(flatten)]
    result: GradeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    feedback_source: Option<FeedbackSource>,
}

#[derive(Debug, Serialize)]
struct BatchReport {
    results: Vec<SubmissionReport>,
    topics: HashMap<String, TopicStat>,
    weak_topics: Vec<TopicStat>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "grading_engine=debug".into());

    // Logs go to stderr so stdout carries only the JSON report
    if std::env::var("APP_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn read_submissions(path: Option<&str>) -> anyhow::Result<Vec<GradingInput>> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read submissions from {}", path))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read submissions from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&raw).context("Submissions must be a JSON array of grading inputs")
}

async fn report_submission(
    engine: &GradingEngine,
    options: &Options,
    submission: &GradingInput,
) -> SubmissionReport {
    let mut result = engine.grade(&submission.question, &submission.raw_answer);

    if options.joint {
        let evaluation = engine
            .evaluate_with_llm(&submission.question, &submission.raw_answer)
            .await;
        result.score = evaluation.score;
        return SubmissionReport {
            result,
            feedback: Some(evaluation.feedback),
            feedback_source: Some(evaluation.feedback_source),
        };
    }

    if !options.feedback {
        return SubmissionReport {
            result,
            feedback: None,
            feedback_source: None,
        };
    }

    let outcome = engine
        .generate_feedback_with_source(
            &submission.question,
            &submission.raw_answer,
            result.score,
            submission.user_id.as_deref(),
        )
        .await;
    SubmissionReport {
        result,
        feedback: Some(outcome.text),
        feedback_source: Some(outcome.source),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let options = Options::parse();

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded for environment: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let engine = GradingEngine::from_config(&config).await?;

    let submissions = read_submissions(options.input_path())?;
    tracing::info!("Grading {} submissions", submissions.len());

    let results: Vec<SubmissionReport> = stream::iter(&submissions)
        .map(|submission| report_submission(&engine, &options, submission))
        .buffered(FEEDBACK_CONCURRENCY)
        .collect()
        .await;

    let graded: Vec<GradeResult> = results.iter().map(|r| r.result.clone()).collect();
    let topics = engine.analyze_by_topic(&graded);
    let weak = weak_topics(&topics, WEAK_TOPIC_THRESHOLD);

    let report = BatchReport {
        results,
        topics,
        weak_topics: weak,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if options.metrics {
        eprintln!("{}", grading_engine::metrics::render_metrics()?);
    }

    Ok(())
}
