use std::collections::HashMap;

use crate::models::{GradeResult, TopicStat};

/// Per-topic accuracy. A result counts as correct at `score >= 0.5`.
pub fn analyze_by_topic(results: &[GradeResult]) -> HashMap<String, TopicStat> {
    let mut stats: HashMap<String, TopicStat> = HashMap::new();
    for result in results {
        let stat = stats
            .entry(result.topic.clone())
            .or_insert_with(|| TopicStat {
                topic: result.topic.clone(),
                total: 0,
                correct: 0,
                percentage: 0.0,
            });
        stat.total += 1;
        if result.is_correct() {
            stat.correct += 1;
        }
    }

    for stat in stats.values_mut() {
        stat.percentage = percentage(stat.correct, stat.total);
    }
    stats
}

fn percentage(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (1000.0 * correct as f64 / total as f64).round() / 10.0
}

/// Topics below `threshold` percent, weakest first (ties by name).
pub fn weak_topics(stats: &HashMap<String, TopicStat>, threshold: f64) -> Vec<TopicStat> {
    let mut weak: Vec<TopicStat> = stats
        .values()
        .filter(|stat| stat.percentage < threshold)
        .cloned()
        .collect();
    weak.sort_by(|a, b| {
        a.percentage
            .total_cmp(&b.percentage)
            .then_with(|| a.topic.cmp(&b.topic))
    });
    weak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(topic: &str, score: f64) -> GradeResult {
        GradeResult {
            question_id: 1,
            score,
            topic: topic.to_string(),
            correct_answer: String::new(),
            user_answer: String::new(),
        }
    }

    #[test]
    fn groups_and_counts_by_topic() {
        let stats = analyze_by_topic(&[result("loops", 1.0), result("loops", 0.3)]);
        assert_eq!(stats.len(), 1);
        let loops = &stats["loops"];
        assert_eq!(loops.total, 2);
        assert_eq!(loops.correct, 1);
        assert_eq!(loops.percentage, 50.0);
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        let stats = analyze_by_topic(&[
            result("lists", 1.0),
            result("lists", 0.0),
            result("lists", 0.0),
        ]);
        assert_eq!(stats["lists"].percentage, 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn half_credit_counts_as_correct() {
        let stats = analyze_by_topic(&[result("strings", 0.5), result("strings", 0.49)]);
        assert_eq!(stats["strings"].correct, 1);
    }

    #[test]
    fn empty_input_yields_empty_report() {
        assert!(analyze_by_topic(&[]).is_empty());
    }

    #[test]
    fn output_is_independent_of_input_order() {
        let forward = vec![result("a", 1.0), result("b", 0.0), result("a", 0.3)];
        let mut backward = forward.clone();
        backward.reverse();
        assert_eq!(analyze_by_topic(&forward), analyze_by_topic(&backward));
    }

    #[test]
    fn weak_topics_sorted_weakest_first() {
        let stats = analyze_by_topic(&[
            result("loops", 1.0),
            result("lists", 0.0),
            result("strings", 1.0),
            result("strings", 0.0),
            result("classes", 0.0),
        ]);
        let weak: Vec<String> = weak_topics(&stats, 60.0)
            .into_iter()
            .map(|s| s.topic)
            .collect();
        assert_eq!(weak, vec!["classes", "lists", "strings"]);
    }
}
