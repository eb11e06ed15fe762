//! One grading strategy per question type. Every grader is a pure function of
//! `(rules, question, raw_answer)` and never fails: malformed input scores 0.0.

use crate::models::{floor_tier, Question};

use super::normalizer::{contains_term, normalize};
use super::rules::{CompiledBugCategory, RuleSet};
use super::similarity::{
    exact_or_unordered_match, fuzzy_ratio, keyword_coverage, ratio, semantic_similarity,
    token_sort_ratio,
};
use super::syntax::{python_syntax_valid, strip_comments_and_whitespace};

const SYNTAX_WEIGHT: f64 = 0.4;
const KEYWORD_WEIGHT: f64 = 0.3;
const LOGIC_WEIGHT: f64 = 0.3;
const LOGIC_SIMILARITY_MIN: f64 = 80.0;

const BOOLEAN_WEIGHT: f64 = 0.6;
const REASONING_CAP: f64 = 0.4;
const REASONING_MIN_CHARS: usize = 10;
const VERDICT_MAX_CHARS: usize = 5;

// ---------------------------------------------------------------------------
// multiple_choice
// ---------------------------------------------------------------------------

fn choice_token(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c == '(' || c == ')' || c == '.' || c.is_whitespace())
        .to_lowercase()
}

fn strip_choice_label(choice: &str) -> &str {
    let trimmed = choice.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), Some(sep)) if letter.is_ascii_alphabetic() && (sep == ')' || sep == '.') => {
            chars.as_str().trim()
        }
        _ => trimmed,
    }
}

/// All-or-nothing: the chosen letter (or the full text of a choice) must match.
pub fn grade_multiple_choice(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    let answer = choice_token(raw_answer);
    let correct = choice_token(&question.correct_answer);
    if answer.is_empty() || correct.is_empty() {
        return 0.0;
    }
    if answer == correct {
        return 1.0;
    }

    let typed = normalize(rules, raw_answer);
    let chosen = question
        .choices
        .iter()
        .position(|choice| normalize(rules, strip_choice_label(choice)) == typed);
    match chosen.and_then(|idx| u8::try_from(idx).ok()) {
        Some(idx) if idx < 26 => {
            let letter = char::from(b'a' + idx).to_string();
            if letter == correct {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

// ---------------------------------------------------------------------------
// short_answer / legacy
// ---------------------------------------------------------------------------

pub fn grade_short_answer(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    if raw_answer.trim().is_empty() {
        return 0.0;
    }
    let correct = &question.correct_answer;
    if exact_or_unordered_match(rules, raw_answer, correct) {
        return 1.0;
    }

    let similarity = semantic_similarity(rules, question, raw_answer, correct);
    if similarity >= 0.9 {
        1.0
    } else if similarity >= 0.6 {
        0.5
    } else if similarity >= 0.3 {
        0.3
    } else {
        partial_correctness(rules, question, raw_answer)
    }
}

fn partial_correctness(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    let user = normalize(rules, raw_answer);
    let correct = normalize(rules, &question.correct_answer);
    if user.is_empty() || correct.is_empty() {
        return 0.0;
    }

    if user.contains(&correct) || correct.contains(&user) {
        return 0.5;
    }

    let fuzzy = fuzzy_ratio(&user, &correct);
    if fuzzy >= 85 {
        return 0.5;
    }
    if fuzzy >= 70 {
        return 0.3;
    }

    let shares_topic_keyword = rules
        .topic_keywords(&question.topic)
        .iter()
        .any(|k| contains_term(&user, k) && contains_term(&correct, k));
    if shares_topic_keyword {
        0.3
    } else {
        0.0
    }
}

/// Untyped records keep the short-answer behaviour.
pub fn grade_legacy(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    grade_short_answer(rules, question, raw_answer)
}

// ---------------------------------------------------------------------------
// code_completion
// ---------------------------------------------------------------------------

/// Weighted composite of syntax validity, keyword coverage and similarity to
/// the reference solution. Continuous in `[0, 1]`.
pub fn grade_code_completion(_rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    if raw_answer.trim().is_empty() {
        return 0.0;
    }

    let syntax = if python_syntax_valid(raw_answer) {
        SYNTAX_WEIGHT
    } else {
        0.0
    };
    let keywords = keyword_coverage(raw_answer, &question.required_keywords) * KEYWORD_WEIGHT;
    let logic = if logic_similar(raw_answer, &question.correct_answer) {
        LOGIC_WEIGHT
    } else {
        0.0
    };

    (syntax + keywords + logic).min(1.0)
}

fn logic_similar(answer: &str, reference: &str) -> bool {
    let answer = strip_comments_and_whitespace(answer);
    let reference = strip_comments_and_whitespace(reference);
    if answer.is_empty() || reference.is_empty() {
        return false;
    }
    ratio(&answer, &reference) >= LOGIC_SIMILARITY_MIN
}

// ---------------------------------------------------------------------------
// debug_code
// ---------------------------------------------------------------------------

pub fn grade_debug_code(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    if raw_answer.trim().is_empty() {
        return 0.0;
    }
    let identified = bug_identification_score(rules, question, raw_answer);
    let solution = solution_similarity(raw_answer, &question.correct_answer);
    floor_tier(0.5 * identified + 0.5 * solution)
}

/// Bug categories the question expects the learner to name.
pub fn expected_bug_categories<'a>(
    rules: &'a RuleSet,
    question: &Question,
) -> Vec<&'a CompiledBugCategory> {
    let describes = |category: &CompiledBugCategory, text: &str| {
        let label = text.trim().to_lowercase().replace(['-', ' '], "_");
        label == category.name || category.matches(text)
    };

    rules
        .bug_categories()
        .iter()
        .filter(|category| {
            if question.bugs.is_empty() {
                describes(category, &question.correct_answer)
            } else {
                question.bugs.iter().any(|b| describes(category, b))
            }
        })
        .collect()
}

/// Fraction of the expected bug categories that the answer also mentions.
///
/// When neither `bugs` nor the reference names a category, naming any known
/// category counts as full identification.
pub fn bug_identification_score(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    let expected = expected_bug_categories(rules, question);
    if expected.is_empty() {
        let names_any = rules.bug_categories().iter().any(|c| c.matches(raw_answer));
        return if names_any { 1.0 } else { 0.0 };
    }
    let found = expected.iter().filter(|c| c.matches(raw_answer)).count();
    found as f64 / expected.len() as f64
}

pub fn solution_similarity(raw_answer: &str, reference: &str) -> f64 {
    if raw_answer.trim().is_empty() || reference.trim().is_empty() {
        return 0.0;
    }
    let similarity = token_sort_ratio(raw_answer, reference);
    if similarity >= 80.0 {
        1.0
    } else if similarity >= 60.0 {
        0.7
    } else if similarity >= 40.0 {
        0.4
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// true_false
// ---------------------------------------------------------------------------

/// Splits an answer into its leading verdict (if any) and the remaining reasoning.
pub fn parse_true_false<'a>(rules: &RuleSet, raw_answer: &'a str) -> (Option<bool>, &'a str) {
    let trimmed = raw_answer.trim_start_matches(|c: char| !c.is_alphanumeric());
    let token = trimmed
        .split(|c: char| !c.is_alphanumeric())
        .next()
        .unwrap_or("");
    if token.is_empty() || token.chars().count() > VERDICT_MAX_CHARS {
        return (None, raw_answer.trim());
    }
    match rules.parse_boolean_token(token) {
        Some(verdict) => (Some(verdict), trimmed[token.len()..].trim()),
        None => (None, raw_answer.trim()),
    }
}

/// 0.5 for any real explanation, +0.1 per topic keyword, +0.1 for a logical connector.
pub fn reasoning_quality(rules: &RuleSet, topic: &str, reasoning: &str) -> f64 {
    let reasoning = reasoning.trim();
    if reasoning.is_empty() {
        return 0.0;
    }
    let mut quality = 0.0;
    if reasoning.chars().count() >= REASONING_MIN_CHARS {
        quality += 0.5;
    }
    let keywords = rules
        .topic_keywords(topic)
        .iter()
        .filter(|k| contains_term(reasoning, k))
        .count();
    quality += 0.1 * keywords as f64;
    if rules.connectors().iter().any(|c| contains_term(reasoning, c)) {
        quality += 0.1;
    }
    quality.min(1.0)
}

pub fn grade_true_false(rules: &RuleSet, question: &Question, raw_answer: &str) -> f64 {
    let (verdict, reasoning) = parse_true_false(rules, raw_answer);
    let (expected, _) = parse_true_false(rules, &question.correct_answer);

    let boolean = match (verdict, expected) {
        (Some(given), Some(wanted)) if given == wanted => BOOLEAN_WEIGHT,
        _ => 0.0,
    };
    let reasoning = reasoning_quality(rules, &question.topic, reasoning).min(REASONING_CAP);
    floor_tier(boolean + reasoning)
}
