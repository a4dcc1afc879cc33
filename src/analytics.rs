//! Author-facing aggregates over completed attempts.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{AttemptStatus, Quiz, QuizAttempt};

const TOP_PERFORMERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizAnalytics {
    pub quiz_id: Uuid,
    pub total_attempts: usize,
    pub unique_students: usize,
    pub pass_rate: f64,
    pub average_score: f64,
    pub average_time_seconds: f64,
    pub question_stats: Vec<QuestionStat>,
    pub top_performers: Vec<TopPerformer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionStat {
    pub question_index: usize,
    pub text: String,
    pub answered: usize,
    pub correct: usize,
    pub correct_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopPerformer {
    pub student_id: Uuid,
    pub best_percentage: i32,
    pub time_taken_seconds: Option<i64>,
    pub attempts: usize,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

/// Only `completed` attempts count; timed-out and in-progress ones carry no
/// grade.
pub fn summarize(quiz: &Quiz, attempts: &[QuizAttempt]) -> QuizAnalytics {
    let completed: Vec<&QuizAttempt> = attempts
        .iter()
        .filter(|a| a.quiz_id == quiz.id && a.status == AttemptStatus::Completed)
        .collect();
    let total = completed.len();

    let unique_students = completed
        .iter()
        .map(|a| a.student_id)
        .collect::<HashSet<_>>()
        .len();
    let passed = completed.iter().filter(|a| a.passed).count();

    let (average_score, average_time_seconds) = if total == 0 {
        (0.0, 0.0)
    } else {
        let score_sum: i64 = completed.iter().map(|a| i64::from(a.percentage)).sum();
        let time_sum: i64 = completed
            .iter()
            .map(|a| a.time_taken_seconds.unwrap_or(0))
            .sum();
        (
            round2(score_sum as f64 / total as f64),
            round2(time_sum as f64 / total as f64),
        )
    };

    let question_stats = quiz
        .questions
        .iter()
        .enumerate()
        .map(|(index, question)| {
            let answers = completed
                .iter()
                .filter_map(|a| a.answers.iter().find(|g| g.question_index == index));
            let (answered, correct) =
                answers.fold((0, 0), |(n, c), g| (n + 1, c + usize::from(g.is_correct)));
            QuestionStat {
                question_index: index,
                text: question.text.clone(),
                answered,
                correct,
                correct_rate: ratio(correct, total),
            }
        })
        .collect();

    QuizAnalytics {
        quiz_id: quiz.id,
        total_attempts: total,
        unique_students,
        pass_rate: ratio(passed, total),
        average_score,
        average_time_seconds,
        question_stats,
        top_performers: top_performers(&completed),
    }
}

/// Best attempt per student, ranked by percentage, then faster time, then id.
fn top_performers(completed: &[&QuizAttempt]) -> Vec<TopPerformer> {
    let mut best: HashMap<Uuid, TopPerformer> = HashMap::new();
    for a in completed {
        let entry = best.entry(a.student_id).or_insert(TopPerformer {
            student_id: a.student_id,
            best_percentage: a.percentage,
            time_taken_seconds: a.time_taken_seconds,
            attempts: 0,
        });
        entry.attempts += 1;
        let faster = a.time_taken_seconds.unwrap_or(i64::MAX)
            < entry.time_taken_seconds.unwrap_or(i64::MAX);
        if a.percentage > entry.best_percentage
            || (a.percentage == entry.best_percentage && faster)
        {
            entry.best_percentage = a.percentage;
            entry.time_taken_seconds = a.time_taken_seconds;
        }
    }

    let mut ranked: Vec<_> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.best_percentage
            .cmp(&a.best_percentage)
            .then(
                a.time_taken_seconds
                    .unwrap_or(i64::MAX)
                    .cmp(&b.time_taken_seconds.unwrap_or(i64::MAX)),
            )
            .then(a.student_id.cmp(&b.student_id))
    });
    ranked.truncate(TOP_PERFORMERS);
    ranked
}
