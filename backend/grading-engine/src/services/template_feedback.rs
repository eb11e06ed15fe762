use crate::models::{Question, QuestionType};

use super::rules::RuleSet;

const ANSWER_PLACEHOLDER: &str = "정답";
const EMPTY_RESPONSE: &str = "(응답 없음)";
const MAX_ECHO_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackBand {
    Correct,
    Partial,
    Weak,
    Incorrect,
}

/// Score bands differ per type: multiple choice is binary, code completion
/// reflects its weighted composite, true/false separates a right verdict with
/// thin reasoning.
pub fn band_for(question_type: QuestionType, score: f64) -> FeedbackBand {
    match question_type {
        QuestionType::MultipleChoice => {
            if score >= 1.0 {
                FeedbackBand::Correct
            } else {
                FeedbackBand::Incorrect
            }
        }
        QuestionType::CodeCompletion => {
            if score >= 0.8 {
                FeedbackBand::Correct
            } else if score >= 0.4 {
                FeedbackBand::Partial
            } else {
                FeedbackBand::Incorrect
            }
        }
        QuestionType::DebugCode => {
            if score >= 0.8 {
                FeedbackBand::Correct
            } else if score >= 0.5 {
                FeedbackBand::Partial
            } else if score > 0.0 {
                FeedbackBand::Weak
            } else {
                FeedbackBand::Incorrect
            }
        }
        QuestionType::TrueFalse => {
            if score >= 1.0 {
                FeedbackBand::Correct
            } else if score >= 0.6 {
                FeedbackBand::Partial
            } else if score > 0.0 {
                FeedbackBand::Weak
            } else {
                FeedbackBand::Incorrect
            }
        }
        QuestionType::ShortAnswer | QuestionType::Legacy => {
            if score >= 1.0 {
                FeedbackBand::Correct
            } else if score >= 0.5 {
                FeedbackBand::Partial
            } else if score > 0.0 {
                FeedbackBand::Weak
            } else {
                FeedbackBand::Incorrect
            }
        }
    }
}

fn shown(text: &str, fallback: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return fallback.to_string();
    }
    if text.chars().count() > MAX_ECHO_CHARS {
        let cut: String = text.chars().take(MAX_ECHO_CHARS).collect();
        return format!("{}…", cut);
    }
    text.to_string()
}

/// Deterministic feedback for any `(question, answer, score)`. Always non-empty.
pub fn render(rules: &RuleSet, question: &Question, user_answer: &str, score: f64) -> String {
    let correct = shown(&question.correct_answer, ANSWER_PLACEHOLDER);
    let answer = shown(user_answer, EMPTY_RESPONSE);
    let hint = rules.topic_hint(&question.topic);
    let band = band_for(question.question_type, score);

    let body = match (question.question_type, band) {
        (QuestionType::MultipleChoice, FeedbackBand::Correct) => {
            format!("정답입니다! 선택한 답 '{}'이 정답 {}번과 일치해요.", answer, correct)
        }
        (QuestionType::MultipleChoice, _) => format!(
            "아쉽지만 오답입니다. 선택한 답은 '{}'이고, 정답은 '{}'입니다.",
            answer, correct
        ),

        (QuestionType::CodeCompletion, FeedbackBand::Correct) => format!(
            "훌륭합니다! 작성한 코드가 문법적으로 올바르고 요구 사항을 충족합니다. 작성한 코드: {}\n참고 답안: {}",
            answer, correct
        ),
        (QuestionType::CodeCompletion, FeedbackBand::Partial) => format!(
            "코드가 부분적으로 맞습니다. 작성한 코드: {}\n문법 오류나 빠진 키워드가 없는지 확인해 보세요. 참고 답안: {}",
            answer, correct
        ),
        (QuestionType::CodeCompletion, _) => format!(
            "코드를 다시 살펴볼 필요가 있습니다. 작성한 코드: {}\n참고 답안: {}",
            answer, correct
        ),

        (QuestionType::DebugCode, FeedbackBand::Correct) => format!(
            "버그를 정확히 찾고 고쳤습니다! 제출한 답: {}\n모범 답안: {}",
            answer, correct
        ),
        (QuestionType::DebugCode, FeedbackBand::Partial) => format!(
            "버그의 일부를 찾았습니다. 제출한 답: {}\n모범 답안과 비교해 놓친 부분을 확인해 보세요: {}",
            answer, correct
        ),
        (QuestionType::DebugCode, _) => format!(
            "버그를 아직 찾지 못했습니다. 제출한 답: {}\n오류 메시지와 코드를 한 줄씩 확인해 보세요. 모범 답안: {}",
            answer, correct
        ),

        (QuestionType::TrueFalse, FeedbackBand::Correct) => format!(
            "정답입니다! 판단과 근거 모두 훌륭합니다. 제출한 답: {}\n정답: {}",
            answer, correct
        ),
        (QuestionType::TrueFalse, FeedbackBand::Partial) => format!(
            "판단은 맞았습니다({}). 제출한 답: {}\n왜 그런지 근거를 조금 더 구체적으로 설명해 보세요.",
            correct, answer
        ),
        (QuestionType::TrueFalse, _) => format!(
            "판단이 정답과 다릅니다. 제출한 답: {}\n정답은 '{}'입니다.",
            answer, correct
        ),

        (_, FeedbackBand::Correct) => format!(
            "정답입니다! 제출한 답: '{}'\n정답: '{}'",
            answer, correct
        ),
        (_, FeedbackBand::Partial) => format!(
            "거의 맞았습니다. 제출한 답: '{}'\n정답: '{}'",
            answer, correct
        ),
        (_, FeedbackBand::Weak) => format!(
            "일부 개념은 맞았지만 보완이 필요합니다. 제출한 답: '{}'\n정답: '{}'",
            answer, correct
        ),
        (_, FeedbackBand::Incorrect) => format!(
            "오답입니다. 제출한 답: '{}'\n정답: '{}'",
            answer, correct
        ),
    };

    format!("{}\n💡 힌트: {}", body, hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rules::default_rules;

    #[test]
    fn multiple_choice_has_two_bands() {
        assert_eq!(band_for(QuestionType::MultipleChoice, 1.0), FeedbackBand::Correct);
        assert_eq!(band_for(QuestionType::MultipleChoice, 0.5), FeedbackBand::Incorrect);
        assert_eq!(band_for(QuestionType::MultipleChoice, 0.0), FeedbackBand::Incorrect);
    }

    #[test]
    fn code_completion_bands_follow_composite() {
        assert_eq!(band_for(QuestionType::CodeCompletion, 0.85), FeedbackBand::Correct);
        assert_eq!(band_for(QuestionType::CodeCompletion, 0.4), FeedbackBand::Partial);
        assert_eq!(band_for(QuestionType::CodeCompletion, 0.39), FeedbackBand::Incorrect);
    }

    #[test]
    fn render_embeds_answers_and_topic_hint() {
        let rules = default_rules();
        let q = Question::new(1, QuestionType::ShortAnswer, "loops", "range");
        let text = render(rules, &q, "rnage", 0.5);
        assert!(text.contains("range"));
        assert!(text.contains("rnage"));
        assert!(text.contains(rules.topic_hint("loops")));
    }

    #[test]
    fn render_uses_placeholders_for_blank_fields() {
        let rules = default_rules();
        let q = Question::new(2, QuestionType::DebugCode, "unknown-topic", "  ");
        let text = render(rules, &q, "", 0.0);
        assert!(text.contains(ANSWER_PLACEHOLDER));
        assert!(text.contains(EMPTY_RESPONSE));
        assert!(text.contains(rules.topic_hint("unknown-topic")));
        assert!(!text.contains("''"));
    }

    #[test]
    fn render_is_deterministic_and_non_empty_for_every_type() {
        let rules = default_rules();
        for question_type in [
            QuestionType::MultipleChoice,
            QuestionType::ShortAnswer,
            QuestionType::CodeCompletion,
            QuestionType::DebugCode,
            QuestionType::TrueFalse,
            QuestionType::Legacy,
        ] {
            let q = Question::new(3, question_type, "lists", "kappa");
            for score in [0.0, 0.3, 0.5, 0.6, 0.8, 1.0] {
                let first = render(rules, &q, "omega", score);
                assert!(!first.trim().is_empty());
                assert!(
                    first.contains("kappa") && first.contains("omega"),
                    "{question_type} at {score}: {first}"
                );
                assert_eq!(first, render(rules, &q, "omega", score));
            }
        }
    }

    #[test]
    fn long_answers_are_truncated() {
        let rules = default_rules();
        let q = Question::new(4, QuestionType::ShortAnswer, "strings", "x");
        let long = "y".repeat(1000);
        let text = render(rules, &q, &long, 0.0);
        assert!(text.chars().count() < 600);
    }
}
