use serde::{Deserialize, Serialize};

use super::question::Question;

/// Answers at or above this score count as correct in topic statistics.
pub const CORRECT_THRESHOLD: f64 = 0.5;

const TIER_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingInput {
    pub question: Question,
    pub raw_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub question_id: i64,
    pub score: f64,
    pub topic: String,
    pub correct_answer: String,
    pub user_answer: String,
}

impl GradeResult {
    pub fn is_correct(&self) -> bool {
        self.score >= CORRECT_THRESHOLD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicStat {
    pub topic: String,
    pub total: u32,
    pub correct: u32,
    pub percentage: f64,
}

/// Score and explanation produced by a single joint provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiJointResult {
    pub score: f64,
    pub feedback: String,
}

/// Discrete partial-credit tiers shared by every grader except code completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    Incorrect,
    Minimal,
    Partial,
    Substantial,
    Mostly,
    Correct,
}

impl ScoreTier {
    pub const ALL: [ScoreTier; 6] = [
        ScoreTier::Incorrect,
        ScoreTier::Minimal,
        ScoreTier::Partial,
        ScoreTier::Substantial,
        ScoreTier::Mostly,
        ScoreTier::Correct,
    ];

    pub fn value(&self) -> f64 {
        match self {
            ScoreTier::Incorrect => 0.0,
            ScoreTier::Minimal => 0.3,
            ScoreTier::Partial => 0.5,
            ScoreTier::Substantial => 0.6,
            ScoreTier::Mostly => 0.8,
            ScoreTier::Correct => 1.0,
        }
    }

    /// Highest tier whose value does not exceed `score`.
    pub fn floor(score: f64) -> ScoreTier {
        if !score.is_finite() {
            return ScoreTier::Incorrect;
        }
        ScoreTier::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| tier.value() <= score + TIER_EPSILON)
            .unwrap_or(ScoreTier::Incorrect)
    }

    /// Tier closest to `score`; ties go to the lower tier.
    pub fn nearest(score: f64) -> ScoreTier {
        let mut best = ScoreTier::Incorrect;
        let mut best_distance = f64::MAX;
        for tier in ScoreTier::ALL {
            let distance = (tier.value() - score).abs();
            if distance + TIER_EPSILON < best_distance {
                best = tier;
                best_distance = distance;
            }
        }
        best
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn is_tier_value(score: f64) -> bool {
        ScoreTier::ALL
            .iter()
            .any(|tier| (tier.value() - score).abs() < TIER_EPSILON)
    }
}

/// Snaps a composite score down onto the discrete tier set, capped at 1.0.
pub fn floor_tier(score: f64) -> f64 {
    ScoreTier::floor(score.min(1.0)).value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_snaps_down_to_tier() {
        assert_eq!(floor_tier(0.0), 0.0);
        assert_eq!(floor_tier(0.29), 0.0);
        assert_eq!(floor_tier(0.4), 0.3);
        assert_eq!(floor_tier(0.55), 0.5);
        assert_eq!(floor_tier(0.6 + 0.1 + 0.1), 0.8);
        assert_eq!(floor_tier(0.99), 0.8);
        assert_eq!(floor_tier(1.7), 1.0);
        assert_eq!(floor_tier(f64::NAN), 0.0);
    }

    #[test]
    fn floor_tolerates_float_noise() {
        // 0.1 * 3 == 0.30000000000000004, 0.7 - 0.4 == 0.29999999999999993
        assert_eq!(floor_tier(0.7 - 0.4), 0.3);
        assert_eq!(floor_tier(0.5 * 0.6 + 0.5 * 0.6), 0.6);
    }

    #[test]
    fn nearest_prefers_lower_tier_on_ties() {
        assert_eq!(ScoreTier::nearest(0.55), ScoreTier::Partial);
        assert_eq!(ScoreTier::nearest(0.9), ScoreTier::Mostly);
        assert_eq!(ScoreTier::nearest(0.95), ScoreTier::Correct);
    }

    #[test]
    fn correct_threshold_is_inclusive() {
        let result = GradeResult {
            question_id: 1,
            score: 0.5,
            topic: "loops".into(),
            correct_answer: "for".into(),
            user_answer: "for loop".into(),
        };
        assert!(result.is_correct());
        assert!(!GradeResult { score: 0.3, ..result }.is_correct());
    }
}
