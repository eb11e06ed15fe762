//! Comparison primitives shared by the graders.
//!
//! The fuzzy ratios follow the usual indel-distance definitions on characters:
//! `ratio = 200 * lcs / (len_a + len_b)`, with the partial, token-sort and
//! token-set variants built on top of it.

use std::collections::{BTreeSet, HashSet};

use crate::models::Question;

use super::normalizer::{normalize, word_tokens};
use super::rules::{RuleSet, SynonymGroup};

/// Normalized equality, or equality of the whitespace-split token sets.
/// Blank input never matches.
pub fn exact_or_unordered_match(rules: &RuleSet, a: &str, b: &str) -> bool {
    let a = normalize(rules, a);
    let b = normalize(rules, b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();
    a_tokens == b_tokens
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// Indel similarity in `[0, 100]`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Characters of the shorter side that [`partial_ratio`] aligns.
const PARTIAL_MAX_SHORT_CHARS: usize = 100;
/// Characters of the longer side that [`partial_ratio`] slides over.
const PARTIAL_MAX_LONG_CHARS: usize = 800;

/// Best [`ratio`] of the shorter string against every same-length window of the longer.
///
/// Both sides are truncated before alignment, so the cost stays bounded for
/// arbitrarily long answers.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (mut short, mut long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.truncate(PARTIAL_MAX_SHORT_CHARS);
    long.truncate(PARTIAL_MAX_LONG_CHARS.max(short.len()));
    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }
    if short.len() == long.len() {
        return ratio_chars(&short, &long);
    }
    let mut best = 0.0f64;
    for window in long.windows(short.len()) {
        best = best.max(ratio_chars(&short, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn sorted_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    tokens.sort();
    tokens
}

/// [`ratio`] after sorting the whitespace tokens of both sides.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

/// Compares the shared tokens against each side's full token set, so padding
/// and reordering do not lower the score.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let a_set: BTreeSet<String> = sorted_tokens(a).into_iter().collect();
    let b_set: BTreeSet<String> = sorted_tokens(b).into_iter().collect();
    if a_set.is_empty() || b_set.is_empty() {
        return 0.0;
    }

    let join = |items: Vec<&String>| {
        items
            .into_iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let sect = join(a_set.intersection(&b_set).collect());
    let only_a = join(a_set.difference(&b_set).collect());
    let only_b = join(b_set.difference(&a_set).collect());

    let combine = |rest: &str| match (sect.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => sect.clone(),
        (false, false) => format!("{} {}", sect, rest),
    };
    let combined_a = combine(&only_a);
    let combined_b = combine(&only_b);

    let mut best = ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_a))
            .max(ratio(&sect, &combined_b));
    }
    best
}

/// Larger of the partial and token-set ratios, rounded to an integer percentage.
pub fn fuzzy_ratio(a: &str, b: &str) -> u32 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let best = partial_ratio(&a, &b).max(token_set_ratio(&a, &b));
    best.round().clamp(0.0, 100.0) as u32
}

fn is_hangul_token(token: &str) -> bool {
    token
        .chars()
        .any(|c| matches!(c, '\u{AC00}'..='\u{D7A3}'))
}

/// Longest particle a Korean token may carry after a synonym stem (e.g. 리스트는).
const MAX_PARTICLE_CHARS: usize = 2;

fn find_group<'a>(groups: &[&'a SynonymGroup], token: &str) -> Option<&'a SynonymGroup> {
    let exact = groups
        .iter()
        .find(|g| g.canonical == token || g.variants.iter().any(|v| v == token));
    if let Some(group) = exact {
        return Some(*group);
    }
    if !is_hangul_token(token) {
        return None;
    }
    let token_len = token.chars().count();
    groups
        .iter()
        .filter_map(|g| {
            std::iter::once(&g.canonical)
                .chain(g.variants.iter())
                .filter(|stem| is_hangul_token(stem) && token.starts_with(stem.as_str()))
                .map(|stem| stem.chars().count())
                .filter(|stem_len| token_len - stem_len <= MAX_PARTICLE_CHARS)
                .max()
                .map(|stem_len| (stem_len, *g))
        })
        .max_by_key(|(stem_len, _)| *stem_len)
        .map(|(_, g)| g)
}

/// Word tokens of `text` with every synonym-group member replaced by the whole group.
pub fn expand_synonyms(rules: &RuleSet, topic: &str, text: &str) -> HashSet<String> {
    let groups: Vec<&SynonymGroup> = rules.synonym_groups(topic).collect();
    let mut expanded = HashSet::new();
    for token in word_tokens(&normalize(rules, text)) {
        match find_group(&groups, &token) {
            Some(group) => {
                expanded.insert(group.canonical.clone());
                expanded.extend(group.variants.iter().cloned());
            }
            None => {
                expanded.insert(token);
            }
        }
    }
    expanded
}

/// Share of the correct answer's expanded vocabulary that the learner's answer covers.
pub fn semantic_similarity(
    rules: &RuleSet,
    question: &Question,
    user_text: &str,
    correct_text: &str,
) -> f64 {
    let expanded_correct = expand_synonyms(rules, &question.topic, correct_text);
    if expanded_correct.is_empty() {
        return 0.0;
    }
    let expanded_user = expand_synonyms(rules, &question.topic, user_text);
    let shared = expanded_correct.intersection(&expanded_user).count();
    shared as f64 / expanded_correct.len() as f64
}

/// Fraction of `required_keywords` found in `text` (case-insensitive substring).
/// An empty keyword list is vacuously satisfied.
pub fn keyword_coverage(text: &str, required_keywords: &[String]) -> f64 {
    if required_keywords.is_empty() {
        return 1.0;
    }
    let haystack = text.to_lowercase();
    let found = required_keywords
        .iter()
        .filter(|k| haystack.contains(&k.to_lowercase()))
        .count();
    found as f64 / required_keywords.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestionType;
    use crate::services::rules::default_rules;

    fn question(topic: &str) -> Question {
        Question::new(1, QuestionType::ShortAnswer, topic, "")
    }

    #[test]
    fn unordered_tokens_match() {
        let rules = default_rules();
        assert!(exact_or_unordered_match(rules, "key value", "Value  KEY"));
        assert!(exact_or_unordered_match(rules, "dict", "dictionary"));
        assert!(!exact_or_unordered_match(rules, "key", "key value"));
        assert!(!exact_or_unordered_match(rules, "", ""));
    }

    #[test]
    fn ratio_bounds() {
        assert_eq!(ratio("abc", "abc"), 100.0);
        assert_eq!(ratio("abc", "xyz"), 0.0);
        assert_eq!(ratio("", ""), 100.0);
        assert!((ratio("abcd", "abce") - 75.0).abs() < 1e-9);
    }

    #[test]
    fn partial_ratio_finds_embedded_answer() {
        assert_eq!(partial_ratio("append", "use list.append(x)"), 100.0);
        assert_eq!(partial_ratio("", "abc"), 0.0);
    }

    #[test]
    fn partial_ratio_stays_fast_on_long_text() {
        let short = "for i in range(10): total += i ".repeat(45);
        let long = "while count < limit: count += step ".repeat(80);
        let started = std::time::Instant::now();
        let score = partial_ratio(&short, &long);
        assert!((0.0..=100.0).contains(&score));
        assert!(
            started.elapsed() < std::time::Duration::from_secs(2),
            "took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn token_set_ignores_order_and_padding() {
        assert_eq!(token_set_ratio("for loop range", "range for loop"), 100.0);
        assert_eq!(token_set_ratio("for loop", "i think for loop is used"), 100.0);
        assert_eq!(token_set_ratio("", "abc"), 0.0);
    }

    #[test]
    fn token_sort_ratio_reorders() {
        assert_eq!(token_sort_ratio("b a", "a b"), 100.0);
    }

    #[test]
    fn fuzzy_ratio_takes_maximum_of_measures() {
        let a = "the loop runs ten times";
        let b = "ten times the loop runs";
        let expected = partial_ratio(a, b).max(token_set_ratio(a, b)).round() as u32;
        assert_eq!(fuzzy_ratio(a, b), expected);
        assert_eq!(fuzzy_ratio(a, b), 100);
        assert_eq!(fuzzy_ratio("", "abc"), 0);
        assert!(fuzzy_ratio("abc", "xyz") <= 100);
    }

    #[test]
    fn semantic_similarity_folds_synonyms() {
        let rules = default_rules();
        let q = question("dictionaries");
        assert_eq!(semantic_similarity(rules, &q, "dict", "dictionary"), 1.0);
        assert_eq!(semantic_similarity(rules, &q, "딕셔너리", "dictionary"), 1.0);
        assert_eq!(semantic_similarity(rules, &q, "리스트는", "list"), 1.0);
    }

    #[test]
    fn semantic_similarity_is_symmetric_for_same_group() {
        let rules = default_rules();
        let q = question("dictionaries");
        let forward = semantic_similarity(rules, &q, "dict", "dictionary");
        let backward = semantic_similarity(rules, &q, "dictionary", "dict");
        assert!((forward - backward).abs() < 1e-9);
    }

    #[test]
    fn semantic_similarity_divides_by_correct_side() {
        let rules = default_rules();
        let q = question("misc");
        // correct side: {alpha, beta}; user covers alpha only
        assert_eq!(semantic_similarity(rules, &q, "alpha gamma", "alpha beta"), 0.5);
        assert_eq!(semantic_similarity(rules, &q, "anything", ""), 0.0);
        assert_eq!(semantic_similarity(rules, &q, "anything", "  ,; "), 0.0);
    }

    #[test]
    fn topic_scoped_synonyms_apply_only_to_their_topic() {
        let rules = default_rules();
        let loops = question("loops");
        let other = question("strings");
        assert_eq!(semantic_similarity(rules, &loops, "범위", "range"), 1.0);
        assert_eq!(semantic_similarity(rules, &other, "범위", "range"), 0.0);
    }

    #[test]
    fn keyword_coverage_counts_substrings() {
        let keywords = vec!["append".to_string(), "For".to_string()];
        assert_eq!(keyword_coverage("for x in y: out.append(x)", &keywords), 1.0);
        assert_eq!(keyword_coverage("out.append(x)", &keywords), 0.5);
        assert_eq!(keyword_coverage("anything", &[]), 1.0);
        assert_eq!(keyword_coverage("", &[]), 1.0);
    }
}
