use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::metrics::GRADER_FAILURES_TOTAL;
use crate::models::{floor_tier, GradeResult, Question, QuestionType};

use super::graders;
use super::normalizer::normalize;
use super::rules::RuleSet;

/// Routes an answer to the grader for its question type. Never fails: a grader
/// that panics is logged and replaced by the legacy grader.
pub fn score(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    let normalized_answer = normalize(rules, raw_answer);
    if !normalized_answer.is_empty()
        && normalized_answer == normalize(rules, &question.correct_answer)
    {
        return 1.0;
    }

    let grader = grader_for(question.question_type);
    match catch_unwind(AssertUnwindSafe(|| grader(rules, question, raw_answer))) {
        Ok(score) if score.is_finite() => settle(question.question_type, score),
        Ok(score) => {
            tracing::error!(
                "Grader for question {} ({}) returned non-finite score {}, using legacy grader",
                question.id,
                question.question_type,
                score
            );
            record_failure(question.question_type);
            legacy_score(rules, question, raw_answer)
        }
        Err(_) => {
            tracing::error!(
                "Grader for question {} ({}) panicked, using legacy grader",
                question.id,
                question.question_type
            );
            record_failure(question.question_type);
            legacy_score(rules, question, raw_answer)
        }
    }
}

/// Clamps to `[0, 1]` and keeps discrete types on the tier set.
fn settle(question_type: QuestionType, score: f64) -> f64 {
    let score = score.clamp(0.0, 1.0);
    if question_type.is_discrete() {
        floor_tier(score)
    } else {
        score
    }
}

fn record_failure(question_type: QuestionType) {
    GRADER_FAILURES_TOTAL
        .with_label_values(&[question_type.as_str()])
        .inc();
}

type GraderFn = fn(&RuleSet, &Question, &str) -> f64;

fn grader_for(question_type: QuestionType) -> GraderFn {
    match question_type {
        QuestionType::MultipleChoice => graders::grade_multiple_choice,
        QuestionType::ShortAnswer => graders::grade_short_answer,
        QuestionType::CodeCompletion => graders::grade_code_completion,
        QuestionType::DebugCode => graders::grade_debug_code,
        QuestionType::TrueFalse => graders::grade_true_false,
        QuestionType::Legacy => graders::grade_legacy,
    }
}

fn legacy_score(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    catch_unwind(AssertUnwindSafe(|| {
        graders::grade_legacy(rules, question, raw_answer)
    }))
    .ok()
    .filter(|score| score.is_finite())
    .map(|score| settle(QuestionType::Legacy, score))
    .unwrap_or(0.0)
}

/// Scores the answer and packages it for topic aggregation and feedback.
pub fn grade(rules: &RuleSet, question: &Question, raw_answer: &str) -> GradeResult {
    GradeResult {
        question_id: question.id,
        score: score(rules, question, raw_answer),
        topic: question.topic.clone(),
        correct_answer: question.correct_answer.clone(),
        user_answer: raw_answer.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rules::default_rules;

    #[test]
    fn exact_answer_scores_full_for_every_type() {
        let rules = default_rules();
        for question_type in [
            QuestionType::MultipleChoice,
            QuestionType::ShortAnswer,
            QuestionType::CodeCompletion,
            QuestionType::DebugCode,
            QuestionType::TrueFalse,
            QuestionType::Legacy,
        ] {
            let q = Question::new(1, question_type, "loops", "true")
                .with_required_keywords(&["zzz"]);
            assert_eq!(score(rules, &q, " TRUE "), 1.0, "{question_type}");
        }
    }

    #[test]
    fn legacy_uses_short_answer_rules() {
        let rules = default_rules();
        let legacy = Question::new(2, QuestionType::Legacy, "misc", "alpha beta gamma delta");
        let short = Question {
            question_type: QuestionType::ShortAnswer,
            ..legacy.clone()
        };
        for answer in ["alpha beta", "alpha beta gamma", "nothing", ""] {
            assert_eq!(score(rules, &legacy, answer), score(rules, &short, answer));
        }
    }

    #[test]
    fn blank_answer_against_blank_key_scores_zero() {
        let rules = default_rules();
        let q = Question::new(3, QuestionType::ShortAnswer, "misc", "");
        assert_eq!(score(rules, &q, ""), 0.0);
    }

    #[test]
    fn settle_keeps_discrete_types_on_tiers() {
        assert_eq!(settle(QuestionType::ShortAnswer, 0.72), 0.6);
        assert_eq!(settle(QuestionType::TrueFalse, 1.4), 1.0);
        assert_eq!(settle(QuestionType::CodeCompletion, 0.72), 0.72);
        assert_eq!(settle(QuestionType::CodeCompletion, -0.2), 0.0);
    }

    #[test]
    fn grade_carries_question_context() {
        let rules = default_rules();
        let q = Question::new(4, QuestionType::MultipleChoice, "lists", "B");
        let result = grade(rules, &q, "b");
        assert_eq!(result.question_id, 4);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.topic, "lists");
        assert_eq!(result.correct_answer, "B");
        assert_eq!(result.user_answer, "b");
    }
}
