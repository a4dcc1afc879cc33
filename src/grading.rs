//! Quiz grading.
//!
//! Pure: the result depends only on the quiz definition and the answers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{AnswerValue, GradedAnswer, QuestionKind, Quiz, SubmittedAnswer};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub score: i32,
    pub total_points: i32,
    pub percentage: i32,
    pub passed: bool,
    pub graded_answers: Vec<GradedAnswer>,
}

/// Grade `answers` against the current definition of `quiz`.
///
/// Answers pointing past the last question are dropped, as are repeat
/// answers to a question already answered earlier in the list.
pub fn grade(quiz: &Quiz, answers: &[SubmittedAnswer]) -> GradeResult {
    let mut seen = HashSet::new();
    let mut graded_answers = Vec::with_capacity(answers.len());
    let mut score = 0;

    for answer in answers {
        let Some(question) = quiz.questions.get(answer.question_index) else {
            continue;
        };
        if !seen.insert(answer.question_index) {
            continue;
        }
        let is_correct = is_correct(&question.kind, &answer.answer);
        let points_earned = if is_correct { question.points } else { 0 };
        score += points_earned;
        graded_answers.push(GradedAnswer {
            question_index: answer.question_index,
            submitted_answer: answer.answer.clone(),
            is_correct,
            points_earned,
        });
    }

    let total_points = quiz.total_points();
    let percentage = percentage(score, total_points);
    GradeResult {
        score,
        total_points,
        percentage,
        passed: percentage >= quiz.passing_score,
        graded_answers,
    }
}

/// An answer of the wrong shape for its question is simply wrong.
pub fn is_correct(kind: &QuestionKind, answer: &AnswerValue) -> bool {
    match (kind, answer) {
        (QuestionKind::Mcq { correct_answer, .. }, AnswerValue::Choice(i)) => i == correct_answer,
        (QuestionKind::TrueFalse { correct_answer }, AnswerValue::Flag(b)) => b == correct_answer,
        (QuestionKind::ShortAnswer { correct_answer }, AnswerValue::Text(s)) => {
            s.trim().to_lowercase() == correct_answer.trim().to_lowercase()
        }
        _ => false,
    }
}

/// `round(100 * score / total)` with halves rounded up, clamped to 0..=100.
/// A quiz worth nothing scores 0.
pub fn percentage(score: i32, total_points: i32) -> i32 {
    if total_points <= 0 {
        return 0;
    }
    let score = i64::from(score.max(0));
    let total = i64::from(total_points);
    let rounded = (200 * score + total) / (2 * total);
    rounded.clamp(0, 100) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Question;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn quiz(questions: Vec<Question>, passing_score: i32) -> Quiz {
        Quiz {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            section_id: None,
            title: "Quiz".into(),
            description: None,
            questions,
            passing_score,
            time_limit_minutes: 0,
            attempts_allowed: -1,
            is_required: false,
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn mcq(correct: usize, points: i32) -> Question {
        Question {
            text: "Pick".into(),
            kind: QuestionKind::Mcq {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_answer: correct,
            },
            points,
            explanation: None,
        }
    }

    fn short(answer: &str) -> Question {
        Question {
            text: "Say".into(),
            kind: QuestionKind::ShortAnswer {
                correct_answer: answer.into(),
            },
            points: 1,
            explanation: None,
        }
    }

    fn ans(question_index: usize, answer: AnswerValue) -> SubmittedAnswer {
        SubmittedAnswer {
            question_index,
            answer,
        }
    }

    #[test]
    fn two_correct_mcq_answers_pass() {
        let q = quiz(vec![mcq(0, 1), mcq(2, 1)], 50);
        let result = grade(
            &q,
            &[ans(0, AnswerValue::Choice(0)), ans(1, AnswerValue::Choice(2))],
        );
        assert_eq!(result.score, 2);
        assert_eq!(result.total_points, 2);
        assert_eq!(result.percentage, 100);
        assert!(result.passed);
        assert!(result.graded_answers.iter().all(|a| a.is_correct));
    }

    #[test]
    fn short_answer_ignores_case_and_whitespace() {
        let q = quiz(vec![short("Paris")], 100);
        let result = grade(&q, &[ans(0, AnswerValue::Text("  pARIS \n".into()))]);
        assert_eq!(result.score, 1);
        assert!(result.passed);
    }

    #[test]
    fn true_false_requires_exact_flag() {
        let q = quiz(
            vec![Question {
                text: "Water is wet".into(),
                kind: QuestionKind::TrueFalse {
                    correct_answer: true,
                },
                points: 2,
                explanation: None,
            }],
            50,
        );
        assert_eq!(grade(&q, &[ans(0, AnswerValue::Flag(true))]).score, 2);
        assert_eq!(grade(&q, &[ans(0, AnswerValue::Flag(false))]).score, 0);
    }

    #[test]
    fn wrong_answer_shape_is_incorrect() {
        let q = quiz(vec![mcq(1, 1)], 50);
        let result = grade(&q, &[ans(0, AnswerValue::Text("1".into()))]);
        assert_eq!(result.score, 0);
        assert!(!result.graded_answers[0].is_correct);
    }

    #[test]
    fn unknown_question_index_is_dropped() {
        let q = quiz(vec![mcq(0, 1)], 50);
        let result = grade(
            &q,
            &[ans(7, AnswerValue::Choice(0)), ans(0, AnswerValue::Choice(0))],
        );
        assert_eq!(result.graded_answers.len(), 1);
        assert_eq!(result.score, 1);
    }

    #[test]
    fn repeat_answers_count_once() {
        let q = quiz(vec![mcq(0, 1), mcq(0, 1)], 50);
        let result = grade(
            &q,
            &[ans(0, AnswerValue::Choice(0)), ans(0, AnswerValue::Choice(0))],
        );
        assert_eq!(result.score, 1);
        assert_eq!(result.percentage, 50);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let q = quiz(Vec::new(), 0);
        let result = grade(&q, &[ans(0, AnswerValue::Choice(0))]);
        assert_eq!(result.total_points, 0);
        assert_eq!(result.percentage, 0);
        assert!(result.passed);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(0, 5), 0);
    }

    fn arb_question() -> impl Strategy<Value = Question> {
        prop_oneof![
            (0usize..4, 1i32..5).prop_map(|(c, p)| Question {
                text: "mcq".into(),
                kind: QuestionKind::Mcq {
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_answer: c,
                },
                points: p,
                explanation: None,
            }),
            (any::<bool>(), 1i32..5).prop_map(|(b, p)| Question {
                text: "tf".into(),
                kind: QuestionKind::TrueFalse { correct_answer: b },
                points: p,
                explanation: None,
            }),
            ("[a-c]{1,3}", 1i32..5).prop_map(|(s, p)| Question {
                text: "short".into(),
                kind: QuestionKind::ShortAnswer { correct_answer: s },
                points: p,
                explanation: None,
            }),
        ]
    }

    fn arb_answer() -> impl Strategy<Value = SubmittedAnswer> {
        let value = prop_oneof![
            (0usize..5).prop_map(AnswerValue::Choice),
            any::<bool>().prop_map(AnswerValue::Flag),
            "[a-cA-C ]{0,4}".prop_map(AnswerValue::Text),
        ];
        (0usize..8, value).prop_map(|(question_index, answer)| SubmittedAnswer {
            question_index,
            answer,
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_grading_is_deterministic(
            questions in proptest::collection::vec(arb_question(), 0..6),
            answers in proptest::collection::vec(arb_answer(), 0..10),
            passing in 0i32..=100,
        ) {
            let q = quiz(questions, passing);
            prop_assert_eq!(grade(&q, &answers), grade(&q, &answers));
        }

        #[test]
        fn prop_percentage_in_bounds(
            questions in proptest::collection::vec(arb_question(), 0..6),
            answers in proptest::collection::vec(arb_answer(), 0..10),
            passing in 0i32..=100,
        ) {
            let q = quiz(questions, passing);
            let r = grade(&q, &answers);
            prop_assert!((0..=100).contains(&r.percentage));
            prop_assert!(r.score <= r.total_points);
            prop_assert_eq!(r.passed, r.percentage >= passing);
        }
    }
}
