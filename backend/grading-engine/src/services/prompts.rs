use crate::models::{Question, QuestionType};

/// Token budget for feedback-only generation.
pub const FEEDBACK_MAX_TOKENS: u32 = 300;
/// Token budget for a combined score-and-explain call.
pub const JOINT_MAX_TOKENS: u32 = 400;

const BASE_PERSONA: &str = "당신은 초보 프로그래머를 가르치는 친절한 파이썬 튜터입니다. \
학습자의 답안을 보고 한국어로 3~5문장의 구체적이고 격려하는 피드백을 작성하세요. \
정답을 그대로 반복하기보다 무엇이 맞았고 무엇을 보완해야 하는지 설명하세요.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

fn type_emphasis(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::MultipleChoice => {
            "객관식 문제입니다. 학습자가 고른 선택지가 왜 맞거나 틀렸는지, 정답 선택지의 핵심 근거를 짚어 주세요."
        }
        QuestionType::ShortAnswer => {
            "단답형 문제입니다. 용어의 정확성과 핵심 개념 이해 여부에 집중하세요."
        }
        QuestionType::CodeCompletion => {
            "코드 완성 문제입니다. 문법 오류, 빠진 필수 키워드, 참고 답안과의 차이를 구체적으로 지적하세요."
        }
        QuestionType::DebugCode => {
            "디버깅 문제입니다. 학습자가 어떤 버그를 찾았고 어떤 버그를 놓쳤는지, 수정 방법이 올바른지 설명하세요."
        }
        QuestionType::TrueFalse => {
            "참/거짓 문제입니다. 판단이 맞았는지와 함께 제시한 근거의 타당성을 평가하세요."
        }
        QuestionType::Legacy => "일반 문제입니다. 답안의 정확성과 개념 이해 정도를 평가하세요.",
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(없음)".to_string()
    } else {
        items.join(", ")
    }
}

fn type_context(question: &Question) -> String {
    match question.question_type {
        QuestionType::MultipleChoice => {
            let choices: Vec<String> = question
                .choices
                .iter()
                .enumerate()
                .map(|(i, choice)| format!("{}. {}", choice_label(i), choice))
                .collect();
            format!("선택지:\n{}", list_lines(&choices))
        }
        QuestionType::CodeCompletion | QuestionType::ShortAnswer => {
            format!("필수 키워드: {}", list_or_none(&question.required_keywords))
        }
        QuestionType::DebugCode => {
            format!("예상되는 버그: {}", list_or_none(&question.bugs))
        }
        QuestionType::TrueFalse | QuestionType::Legacy => String::new(),
    }
}

fn choice_label(index: usize) -> char {
    char::from(b'A' + (index % 26) as u8)
}

fn list_lines(items: &[String]) -> String {
    if items.is_empty() {
        "(없음)".to_string()
    } else {
        items.join("\n")
    }
}

fn question_block(question: &Question, user_answer: &str) -> String {
    let mut block = format!(
        "주제: {}\n난이도: {}\n문제 유형: {}\n",
        question.topic,
        question.difficulty.as_str(),
        question.question_type
    );
    if !question.code_snippet.trim().is_empty() {
        block.push_str(&format!("코드:\n```python\n{}\n```\n", question.code_snippet));
    }
    let context = type_context(question);
    if !context.is_empty() {
        block.push_str(&context);
        block.push('\n');
    }
    block.push_str(&format!(
        "정답: {}\n학습자 답안: {}\n",
        question.correct_answer, user_answer
    ));
    block
}

/// Prompt for explaining an already computed score.
pub fn feedback_prompt(question: &Question, user_answer: &str, score: f64) -> Prompt {
    Prompt {
        system: format!("{} {}", BASE_PERSONA, type_emphasis(question.question_type)),
        user: format!(
            "{}채점 점수: {:.1} / 1.0\n\n위 점수를 바탕으로 학습자에게 줄 피드백을 작성하세요.",
            question_block(question, user_answer),
            score
        ),
    }
}

/// Prompt asking for a score in {0, 0.5, 1} and feedback as strict JSON.
pub fn joint_prompt(question: &Question, user_answer: &str) -> Prompt {
    Prompt {
        system: format!(
            "{} {} 반드시 JSON 객체 하나만 출력하고 다른 텍스트는 쓰지 마세요.",
            BASE_PERSONA,
            type_emphasis(question.question_type)
        ),
        user: format!(
            "{}\n학습자 답안을 채점하고 아래 형식의 JSON으로만 답하세요.\n\
             {{\"score\": 0 | 0.5 | 1, \"feedback\": \"피드백 문장\"}}\n\
             - 1: 완전히 맞음\n- 0.5: 부분적으로 맞음\n- 0: 틀림",
            question_block(question, user_answer)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_choice_prompt_lists_labelled_choices() {
        let q = Question::new(1, QuestionType::MultipleChoice, "lists", "B")
            .with_choices(&["append", "extend"]);
        let prompt = feedback_prompt(&q, "a", 0.0);
        assert!(prompt.user.contains("A. append"));
        assert!(prompt.user.contains("B. extend"));
        assert!(prompt.system.contains("객관식"));
    }

    #[test]
    fn debug_prompt_embeds_code_and_bugs() {
        let q = Question::new(2, QuestionType::DebugCode, "loops", "range(10)")
            .with_code_snippet("for i in rnage(10):\n    print(i)")
            .with_bugs(&["typo"]);
        let prompt = feedback_prompt(&q, "rnage 오타", 0.5);
        assert!(prompt.user.contains("rnage(10)"));
        assert!(prompt.user.contains("예상되는 버그: typo"));
        assert!(prompt.user.contains("0.5"));
    }

    #[test]
    fn completion_prompt_marks_missing_keywords() {
        let q = Question::new(3, QuestionType::CodeCompletion, "functions", "def f(): return 1");
        let prompt = feedback_prompt(&q, "", 0.0);
        assert!(prompt.user.contains("필수 키워드: (없음)"));
        assert!(!prompt.user.contains("```python"));
    }

    #[test]
    fn joint_prompt_demands_json() {
        let q = Question::new(4, QuestionType::TrueFalse, "conditionals", "True");
        let prompt = joint_prompt(&q, "참, 왜냐하면 조건이 참이기 때문");
        assert!(prompt.user.contains("\"score\": 0 | 0.5 | 1"));
        assert!(prompt.system.contains("JSON"));
    }
}
