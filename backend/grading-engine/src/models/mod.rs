pub mod feedback;
pub mod grade;
pub mod question;

pub use feedback::{Evaluation, EvaluationPath, FeedbackOutcome, FeedbackSource};
pub use grade::{
    floor_tier, AiJointResult, GradeResult, GradingInput, ScoreTier, TopicStat, CORRECT_THRESHOLD,
};
pub use question::{Difficulty, Question, QuestionType};
