//! Answer scoring and adaptive feedback for programming exercises.
//!
//! The deterministic path (normalize, grade, aggregate) is pure and synchronous.
//! Feedback generation and joint evaluation make at most one bounded provider
//! call and always fall back to deterministic output.

pub mod config;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::GradingEngine;
