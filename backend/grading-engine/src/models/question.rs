use serde::{Deserialize, Serialize};

/// Question record as stored by the persistence layer. Read-only for grading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub code_snippet: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub required_keywords: Vec<String>,
    #[serde(default)]
    pub bugs: Vec<String>,
}

impl Question {
    pub fn new(id: i64, question_type: QuestionType, topic: &str, correct_answer: &str) -> Self {
        Self {
            id,
            question_type,
            topic: topic.to_string(),
            difficulty: Difficulty::default(),
            code_snippet: String::new(),
            correct_answer: correct_answer.to_string(),
            choices: Vec::new(),
            required_keywords: Vec::new(),
            bugs: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_required_keywords(mut self, keywords: &[&str]) -> Self {
        self.required_keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_bugs(mut self, bugs: &[&str]) -> Self {
        self.bugs = bugs.iter().map(|b| b.to_string()).collect();
        self
    }

    pub fn with_code_snippet(mut self, code: &str) -> Self {
        self.code_snippet = code.to_string();
        self
    }
}

/// Grading strategy selector. Records without a tag, or with a tag this
/// engine does not know, grade as `Legacy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    CodeCompletion,
    DebugCode,
    TrueFalse,
    #[default]
    Legacy,
}

impl QuestionType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "multiple_choice" => QuestionType::MultipleChoice,
            "short_answer" => QuestionType::ShortAnswer,
            "code_completion" => QuestionType::CodeCompletion,
            "debug_code" => QuestionType::DebugCode,
            "true_false" => QuestionType::TrueFalse,
            other => {
                if !other.is_empty() && other != "legacy" {
                    tracing::debug!("Unknown question_type tag '{}', grading as legacy", other);
                }
                QuestionType::Legacy
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::ShortAnswer => "short_answer",
            QuestionType::CodeCompletion => "code_completion",
            QuestionType::DebugCode => "debug_code",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Legacy => "legacy",
        }
    }

    /// Every type except code completion scores on the discrete tier set.
    pub fn is_discrete(&self) -> bool {
        !matches!(self, QuestionType::CodeCompletion)
    }
}

impl From<Option<String>> for QuestionType {
    fn from(tag: Option<String>) -> Self {
        tag.map(|t| QuestionType::from_tag(&t))
            .unwrap_or(QuestionType::Legacy)
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}
