//! Rule tables that drive normalization and the heuristic graders.
//!
//! Built-in defaults cover Korean/English Python teaching material. A JSON file
//! can override any table at startup (see [`RuleTables::load`]); tables left out
//! of the file keep their defaults.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref DEFAULT_RULES: RuleSet =
        RuleSet::compile(RuleTables::default()).expect("built-in rule tables must compile");
}

/// Shared compiled copy of the built-in tables.
pub fn default_rules() -> &'static RuleSet {
    &DEFAULT_RULES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub canonical: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugCategory {
    pub name: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    /// Token → canonical form applied by the normalizer.
    pub synonyms: HashMap<String, String>,
    /// Programming vocabulary groups used for semantic similarity.
    pub domain_synonyms: Vec<SynonymGroup>,
    /// Extra groups that only apply to questions of one topic.
    pub topic_synonyms: HashMap<String, Vec<SynonymGroup>>,
    pub bug_categories: Vec<BugCategory>,
    pub topic_keywords: HashMap<String, Vec<String>>,
    /// Alternate topic names (e.g. Korean) → key used by the other topic tables.
    pub topic_aliases: HashMap<String, String>,
    pub connectors: Vec<String>,
    pub true_tokens: Vec<String>,
    pub false_tokens: Vec<String>,
    pub true_prefixes: Vec<String>,
    pub false_prefixes: Vec<String>,
    pub topic_hints: HashMap<String, String>,
    pub default_hint: String,
}

impl RuleTables {
    /// Reads overrides from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rule tables from {}", path.display()))?;
        let tables: RuleTables = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse rule tables in {}", path.display()))?;
        Ok(tables)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn group(canonical: &str, variants: &[&str]) -> SynonymGroup {
    SynonymGroup {
        canonical: canonical.to_string(),
        variants: strings(variants),
    }
}

fn bug(name: &str, patterns: &[&str]) -> BugCategory {
    BugCategory {
        name: name.to_string(),
        patterns: strings(patterns),
    }
}

impl Default for RuleTables {
    fn default() -> Self {
        let synonyms = [
            ("dict", "dictionary"),
            ("딕셔너리", "dictionary"),
            ("딕트", "dictionary"),
            ("사전", "dictionary"),
            ("리스트", "list"),
            ("lst", "list"),
            ("튜플", "tuple"),
            ("집합", "set"),
            ("func", "function"),
            ("함수", "function"),
            ("str", "string"),
            ("문자열", "string"),
            ("int", "integer"),
            ("정수", "integer"),
            ("실수", "float"),
            ("변수", "variable"),
            ("반복문", "loop"),
            ("루프", "loop"),
            ("참", "true"),
            ("거짓", "false"),
            ("true", "true"),
            ("false", "false"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let domain_synonyms = vec![
            group(
                "dictionary",
                &["dict", "Dictionary", "딕셔너리", "딕트", "사전", "해시맵", "hashmap"],
            ),
            group("list", &["리스트", "lst", "List"]),
            group("tuple", &["튜플"]),
            group("set", &["집합", "셋"]),
            group("string", &["str", "문자열", "스트링"]),
            group("integer", &["int", "정수"]),
            group("float", &["실수", "부동소수점"]),
            group("function", &["func", "함수", "def"]),
            group("loop", &["반복", "반복문", "루프", "iteration", "순회"]),
            group("variable", &["변수", "var"]),
            group("conditional", &["조건문", "조건", "condition", "if문"]),
            group("exception", &["예외", "예외처리"]),
            group("class", &["클래스"]),
            group("object", &["객체", "오브젝트"]),
            group("index", &["인덱스", "색인"]),
            group("key", &["키"]),
            group("value", &["값", "밸류"]),
            group("immutable", &["불변", "변경불가"]),
            group("mutable", &["가변", "변경가능"]),
            group("return", &["반환", "리턴"]),
            group("parameter", &["매개변수", "param", "파라미터"]),
            group("argument", &["인자", "인수", "arg"]),
        ];

        let mut topic_synonyms = HashMap::new();
        topic_synonyms.insert(
            "loops".to_string(),
            vec![group("range", &["범위"]), group("break", &["중단", "탈출"])],
        );
        topic_synonyms.insert(
            "classes".to_string(),
            vec![
                group("instance", &["인스턴스"]),
                group("method", &["메서드", "메소드"]),
                group("inheritance", &["상속"]),
            ],
        );

        // Patterns describe a bug in words. Debug answers usually carry code,
        // so operators and brackets must not count as naming a category.
        let bug_categories = vec![
            bug("typo", &[r"(?i)오타|철자|typo|misspell|spell"]),
            bug("indentation", &[r"(?i)들여\s*쓰기|인덴트|indent"]),
            bug("semicolon", &[r"(?i)세미\s*콜론|semi\s*-?colon"]),
            bug(
                "variable_name",
                &[r"(?i)변수\s*(명|이름)|variable\s*name|undefined\s*variable|nameerror"],
            ),
            bug(
                "function_name",
                &[r"(?i)함수\s*(명|이름)|function\s*name|undefined\s*function"],
            ),
            bug("bracket", &[r"(?i)괄호|bracket|parenthes[ie]s|\bparen\b|brace"]),
            bug(
                "equals",
                &[r"(?i)대입|할당\s*연산자|assignment|equals?\s*sign|등호"],
            ),
            bug(
                "comparison",
                &[r"(?i)비교|comparison|equality\s*operator"],
            ),
        ];

        let topic_keywords = [
            (
                "loops",
                &["for", "while", "range", "반복", "break", "continue", "iteration", "순회"][..],
            ),
            (
                "variables",
                &["변수", "할당", "재할당", "variable", "assign", "값", "value", "타입", "type"][..],
            ),
            (
                "functions",
                &["def", "return", "함수", "인자", "매개변수", "parameter", "argument", "반환", "호출", "call"][..],
            ),
            (
                "lists",
                &["list", "append", "index", "인덱스", "리스트", "slice", "슬라이싱", "요소", "element", "mutable"][..],
            ),
            (
                "dictionaries",
                &["dict", "dictionary", "key", "value", "키", "값", "딕셔너리", "items", "get"][..],
            ),
            (
                "conditionals",
                &["if", "elif", "else", "조건", "조건문", "비교", "boolean", "true", "false"][..],
            ),
            (
                "strings",
                &["str", "string", "문자열", "인덱싱", "slice", "immutable", "불변", "format", "split", "join"][..],
            ),
            (
                "classes",
                &["class", "self", "클래스", "객체", "object", "instance", "인스턴스", "메서드", "method", "상속", "inheritance"][..],
            ),
            (
                "exceptions",
                &["try", "except", "예외", "raise", "finally", "error", "오류"][..],
            ),
        ]
        .into_iter()
        .map(|(topic, words)| (topic.to_string(), strings(words)))
        .collect();

        let topic_aliases = [
            ("loop", "loops"),
            ("반복문", "loops"),
            ("반복", "loops"),
            ("variable", "variables"),
            ("변수", "variables"),
            ("function", "functions"),
            ("함수", "functions"),
            ("list", "lists"),
            ("리스트", "lists"),
            ("dictionary", "dictionaries"),
            ("dict", "dictionaries"),
            ("딕셔너리", "dictionaries"),
            ("conditional", "conditionals"),
            ("조건문", "conditionals"),
            ("string", "strings"),
            ("문자열", "strings"),
            ("class", "classes"),
            ("클래스", "classes"),
            ("exception", "exceptions"),
            ("예외처리", "exceptions"),
        ]
        .into_iter()
        .map(|(alias, topic)| (alias.to_string(), topic.to_string()))
        .collect();

        let topic_hints = [
            ("loops", "반복 범위(range)와 종료 조건이 의도대로 동작하는지 한 줄씩 따라가 보세요."),
            ("variables", "변수에 어떤 값이 언제 할당되는지 순서대로 적어 보세요."),
            ("functions", "함수의 매개변수와 반환값(return)이 무엇인지 먼저 정리해 보세요."),
            ("lists", "리스트 인덱스는 0부터 시작하고, append와 같은 메서드는 원본을 바꾼다는 점을 기억하세요."),
            ("dictionaries", "딕셔너리는 키(key)로 값(value)을 찾는 구조입니다. 키가 존재하는지 먼저 확인해 보세요."),
            ("conditionals", "if/elif/else 분기마다 조건식이 참인지 거짓인지 직접 대입해 보세요."),
            ("strings", "문자열은 불변(immutable)입니다. 메서드가 새 문자열을 반환하는지 확인해 보세요."),
            ("classes", "self가 가리키는 객체와 __init__에서 초기화되는 속성을 확인해 보세요."),
            ("exceptions", "try 블록에서 어떤 예외가 발생할 수 있고 except가 무엇을 잡는지 확인해 보세요."),
        ]
        .into_iter()
        .map(|(topic, hint)| (topic.to_string(), hint.to_string()))
        .collect();

        Self {
            synonyms,
            domain_synonyms,
            topic_synonyms,
            bug_categories,
            topic_keywords,
            topic_aliases,
            connectors: strings(&[
                "왜냐하면", "때문에", "따라서", "그러므로", "그래서", "즉", "because", "therefore",
                "since", "so", "thus", "hence",
            ]),
            true_tokens: strings(&["o", "true", "t", "참", "yes", "예", "맞다", "맞음", "맞습니다"]),
            false_tokens: strings(&["x", "false", "f", "거짓", "no", "아니오", "틀리다", "틀림", "틀렸다"]),
            true_prefixes: strings(&["맞", "참"]),
            false_prefixes: strings(&["틀", "거짓", "아니"]),
            topic_hints,
            default_hint: "해당 주제의 핵심 개념을 다시 복습해 보세요.".to_string(),
        }
    }
}

/// A bug category with its patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledBugCategory {
    pub name: String,
    patterns: Vec<Regex>,
}

impl CompiledBugCategory {
    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

/// Rule tables with lowercase lookups and compiled regexes, ready for grading.
#[derive(Debug, Clone)]
pub struct RuleSet {
    synonyms: HashMap<String, String>,
    domain_synonyms: Vec<SynonymGroup>,
    topic_synonyms: HashMap<String, Vec<SynonymGroup>>,
    bug_categories: Vec<CompiledBugCategory>,
    topic_keywords: HashMap<String, Vec<String>>,
    topic_aliases: HashMap<String, String>,
    connectors: Vec<String>,
    true_tokens: Vec<String>,
    false_tokens: Vec<String>,
    true_prefixes: Vec<String>,
    false_prefixes: Vec<String>,
    topic_hints: HashMap<String, String>,
    default_hint: String,
}

fn lower_all(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.to_lowercase()).collect()
}

fn lower_groups(groups: Vec<SynonymGroup>) -> Vec<SynonymGroup> {
    groups
        .into_iter()
        .map(|g| SynonymGroup {
            canonical: g.canonical.to_lowercase(),
            variants: lower_all(g.variants),
        })
        .collect()
}

impl RuleSet {
    pub fn compile(tables: RuleTables) -> Result<Self> {
        let mut bug_categories = Vec::with_capacity(tables.bug_categories.len());
        for category in tables.bug_categories {
            let patterns = category
                .patterns
                .iter()
                .map(|p| {
                    Regex::new(p).with_context(|| {
                        format!("Invalid pattern for bug category '{}': {}", category.name, p)
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            bug_categories.push(CompiledBugCategory {
                name: category.name,
                patterns,
            });
        }

        Ok(Self {
            synonyms: tables
                .synonyms
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
                .collect(),
            domain_synonyms: lower_groups(tables.domain_synonyms),
            topic_synonyms: tables
                .topic_synonyms
                .into_iter()
                .map(|(topic, groups)| (topic.to_lowercase(), lower_groups(groups)))
                .collect(),
            bug_categories,
            topic_keywords: tables
                .topic_keywords
                .into_iter()
                .map(|(topic, words)| (topic.to_lowercase(), lower_all(words)))
                .collect(),
            topic_aliases: tables
                .topic_aliases
                .into_iter()
                .map(|(alias, topic)| (alias.to_lowercase(), topic.to_lowercase()))
                .collect(),
            connectors: lower_all(tables.connectors),
            true_tokens: lower_all(tables.true_tokens),
            false_tokens: lower_all(tables.false_tokens),
            true_prefixes: tables.true_prefixes,
            false_prefixes: tables.false_prefixes,
            topic_hints: tables
                .topic_hints
                .into_iter()
                .map(|(topic, hint)| (topic.to_lowercase(), hint))
                .collect(),
            default_hint: tables.default_hint,
        })
    }

    /// Loads overrides from `path` when given, otherwise the built-in tables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let tables = RuleTables::load(path)?;
                tracing::info!("Loaded grading rule tables from {}", path);
                RuleSet::compile(tables)
            }
            None => Ok(DEFAULT_RULES.clone()),
        }
    }

    pub fn canonical_synonym(&self, token: &str) -> Option<&str> {
        self.synonyms.get(token).map(String::as_str)
    }

    /// Resolves a topic name through the alias table.
    pub fn topic_key(&self, topic: &str) -> String {
        let topic = topic.trim().to_lowercase();
        self.topic_aliases.get(&topic).cloned().unwrap_or(topic)
    }

    /// Domain groups plus any groups scoped to `topic`.
    pub fn synonym_groups<'a>(&'a self, topic: &str) -> impl Iterator<Item = &'a SynonymGroup> {
        let scoped = self
            .topic_synonyms
            .get(&self.topic_key(topic))
            .map(|groups| groups.as_slice())
            .unwrap_or(&[]);
        self.domain_synonyms.iter().chain(scoped.iter())
    }

    pub fn bug_categories(&self) -> &[CompiledBugCategory] {
        &self.bug_categories
    }

    pub fn topic_keywords(&self, topic: &str) -> &[String] {
        self.topic_keywords
            .get(&self.topic_key(topic))
            .map(|words| words.as_slice())
            .unwrap_or(&[])
    }

    pub fn connectors(&self) -> &[String] {
        &self.connectors
    }

    /// Interprets a single answer token as O/X, True/False, 참/거짓, 맞/틀.
    pub fn parse_boolean_token(&self, token: &str) -> Option<bool> {
        let token = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if token.is_empty() {
            return None;
        }
        if self.true_tokens.iter().any(|t| *t == token) {
            return Some(true);
        }
        if self.false_tokens.iter().any(|t| *t == token) {
            return Some(false);
        }
        if self.true_prefixes.iter().any(|p| token.starts_with(p.as_str())) {
            return Some(true);
        }
        if self.false_prefixes.iter().any(|p| token.starts_with(p.as_str())) {
            return Some(false);
        }
        None
    }

    pub fn topic_hint(&self, topic: &str) -> &str {
        self.topic_hints
            .get(&self.topic_key(topic))
            .map(String::as_str)
            .unwrap_or(&self.default_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_compile() {
        let rules = default_rules();
        assert_eq!(rules.bug_categories().len(), 8);
        assert!(rules.topic_keywords("loops").contains(&"range".to_string()));
    }

    #[test]
    fn topic_aliases_resolve_korean_names() {
        let rules = default_rules();
        assert_eq!(rules.topic_key("반복문"), "loops");
        assert_eq!(rules.topic_key(" Loops "), "loops");
        assert_eq!(rules.topic_hint("반복문"), rules.topic_hint("loops"));
    }

    #[test]
    fn unknown_topic_falls_back_to_generic_hint() {
        let rules = default_rules();
        assert_eq!(rules.topic_hint("quantum"), "해당 주제의 핵심 개념을 다시 복습해 보세요.");
        assert!(rules.topic_keywords("quantum").is_empty());
    }

    #[test]
    fn boolean_tokens_cover_all_notations() {
        let rules = default_rules();
        for token in ["O", "o", "True", "참", "맞습니다", "(O)"] {
            assert_eq!(rules.parse_boolean_token(token), Some(true), "{token}");
        }
        for token in ["X", "false", "거짓", "틀렸습니다", "아니요"] {
            assert_eq!(rules.parse_boolean_token(token), Some(false), "{token}");
        }
        assert_eq!(rules.parse_boolean_token("maybe"), None);
        assert_eq!(rules.parse_boolean_token("..."), None);
    }

    #[test]
    fn bug_categories_match_descriptions() {
        let rules = default_rules();
        let matched: Vec<&str> = rules
            .bug_categories()
            .iter()
            .filter(|c| c.matches("들여쓰기가 잘못되었고 변수명 오타가 있습니다"))
            .map(|c| c.name.as_str())
            .collect();
        assert!(matched.contains(&"indentation"));
        assert!(matched.contains(&"variable_name"));
        assert!(matched.contains(&"typo"));
        assert!(!matched.contains(&"comparison"));
    }

    #[test]
    fn plain_code_names_no_bug_category() {
        let rules = default_rules();
        for code in [
            "for i in range(3):\n    print(i)",
            "x = foo(); y = [1, 2]; z = {}",
            "if a == b or c != d or e <= f:\n    pass",
        ] {
            let matched: Vec<&str> = rules
                .bug_categories()
                .iter()
                .filter(|c| c.matches(code))
                .map(|c| c.name.as_str())
                .collect();
            assert!(matched.is_empty(), "{code:?} matched {matched:?}");
        }
    }

    #[test]
    fn overrides_merge_with_defaults() {
        let tables: RuleTables =
            serde_json::from_str(r#"{"default_hint": "Review the topic."}"#).unwrap();
        let rules = RuleSet::compile(tables).unwrap();
        assert_eq!(rules.topic_hint("nothing"), "Review the topic.");
        assert_eq!(rules.canonical_synonym("dict"), Some("dictionary"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let mut tables = RuleTables::default();
        tables.bug_categories = vec![bug("broken", &["(unclosed"])];
        assert!(RuleSet::compile(tables).is_err());
    }
}
