use super::rules::RuleSet;

/// Canonicalizes an answer: lowercase, trimmed, single-spaced, with synonym
/// tokens replaced by their canonical form. Commas and semicolons delimit
/// tokens and are preserved.
pub fn normalize(rules: &RuleSet, text: &str) -> String {
    let collapsed = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut token = String::new();
    for c in collapsed.chars() {
        if c == ' ' || c == ',' || c == ';' {
            push_token(rules, &mut out, &token);
            token.clear();
            out.push(c);
        } else {
            token.push(c);
        }
    }
    push_token(rules, &mut out, &token);
    out
}

/// Same as [`normalize`] but accepts a missing value.
pub fn normalize_opt(rules: &RuleSet, text: Option<&str>) -> String {
    text.map(|t| normalize(rules, t)).unwrap_or_default()
}

fn push_token(rules: &RuleSet, out: &mut String, token: &str) {
    if token.is_empty() {
        return;
    }
    match rules.canonical_synonym(token) {
        Some(canonical) => out.push_str(canonical),
        None => out.push_str(token),
    }
}

/// Splits text into lowercase word tokens (letters, digits, Hangul, underscore).
pub fn word_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

/// Whether `term` occurs in `text`. ASCII terms must match a whole word;
/// terms containing Hangul match as substrings since Korean attaches particles.
pub fn contains_term(text: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return false;
    }
    let text = text.to_lowercase();
    if term.chars().any(is_hangul) {
        return text.contains(&term);
    }
    if term.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return word_tokens(&text).iter().any(|t| *t == term);
    }
    text.contains(&term)
}
