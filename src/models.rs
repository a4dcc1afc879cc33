use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permissions::Capabilities;

// --- principals & courses ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Instructor => "instructor",
            Self::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "instructor" => Some(Self::Instructor),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

/// An already-authenticated caller. The role is owned by the identity
/// provider and only ever read here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub const fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Course {
    pub id: Uuid,
    pub owner_id: Uuid,
}

// --- quiz definitions ---

/// Question body keyed by `type`, so a correct answer always carries the
/// shape its question type requires.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionKind {
    Mcq {
        options: Vec<String>,
        correct_answer: usize,
    },
    TrueFalse {
        correct_answer: bool,
    },
    ShortAnswer {
        correct_answer: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default = "default_points")]
    pub points: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

const fn default_points() -> i32 {
    1
}

impl Question {
    pub fn validate(&self, index: usize) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err(format!("question {index}: text is required"));
        }
        if self.points < 1 {
            return Err(format!("question {index}: points must be at least 1"));
        }
        match &self.kind {
            QuestionKind::Mcq {
                options,
                correct_answer,
            } => {
                if options.len() < 2 {
                    return Err(format!("question {index}: mcq needs at least two options"));
                }
                if options.iter().any(|o| o.trim().is_empty()) {
                    return Err(format!("question {index}: options must not be blank"));
                }
                if *correct_answer >= options.len() {
                    return Err(format!(
                        "question {index}: correct_answer {correct_answer} is not an option index"
                    ));
                }
            }
            QuestionKind::TrueFalse { .. } => {}
            QuestionKind::ShortAnswer { correct_answer } => {
                if correct_answer.trim().is_empty() {
                    return Err(format!("question {index}: correct_answer is required"));
                }
            }
        }
        Ok(())
    }

    pub fn public(&self) -> PublicQuestion {
        let kind = match &self.kind {
            QuestionKind::Mcq { options, .. } => PublicQuestionKind::Mcq {
                options: options.clone(),
            },
            QuestionKind::TrueFalse { .. } => PublicQuestionKind::TrueFalse,
            QuestionKind::ShortAnswer { .. } => PublicQuestionKind::ShortAnswer,
        };
        PublicQuestion {
            text: self.text.clone(),
            kind,
            points: self.points,
        }
    }
}

/// Question as shown to a quiz taker: no correct answer, no explanation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicQuestion {
    pub text: String,
    #[serde(flatten)]
    pub kind: PublicQuestionKind,
    pub points: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PublicQuestionKind {
    Mcq { options: Vec<String> },
    TrueFalse,
    ShortAnswer,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    pub passing_score: i32,
    pub time_limit_minutes: i32, // 0 = unlimited
    pub attempts_allowed: i32,   // negative = unlimited
    pub is_required: bool,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quiz {
    pub fn total_points(&self) -> i32 {
        self.questions.iter().map(|q| q.points).sum()
    }

    pub const fn attempt_limit(&self) -> Option<i32> {
        if self.attempts_allowed >= 0 {
            Some(self.attempts_allowed)
        } else {
            None
        }
    }

    pub fn public(&self) -> PublicQuiz {
        PublicQuiz {
            id: self.id,
            course_id: self.course_id,
            section_id: self.section_id,
            title: self.title.clone(),
            description: self.description.clone(),
            questions: self.questions.iter().map(Question::public).collect(),
            total_points: self.total_points(),
            passing_score: self.passing_score,
            time_limit_minutes: self.time_limit_minutes,
            attempts_allowed: self.attempts_allowed,
            is_required: self.is_required,
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicQuiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<PublicQuestion>,
    pub total_points: i32,
    pub passing_score: i32,
    pub time_limit_minutes: i32,
    pub attempts_allowed: i32,
    pub is_required: bool,
}

/// Quiz as returned to a caller: authors get the full definition, everyone
/// else the answer-free view.
#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum QuizView {
    Full(Quiz),
    Public(PublicQuiz),
}

pub fn validate_quiz_fields(
    title: &str,
    questions: &[Question],
    passing_score: i32,
    time_limit_minutes: i32,
) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title is required".into());
    }
    if questions.is_empty() {
        return Err("a quiz needs at least one question".into());
    }
    let mut total: i32 = 0;
    for (i, q) in questions.iter().enumerate() {
        q.validate(i)?;
        total = total
            .checked_add(q.points)
            .ok_or_else(|| String::from("total points too large"))?;
    }
    if !(0..=100).contains(&passing_score) {
        return Err("passing_score must be between 0 and 100".into());
    }
    if time_limit_minutes < 0 {
        return Err("time_limit_minutes must not be negative".into());
    }
    Ok(())
}

// --- attempts ---

/// A submitted answer, decoded once from JSON: a number is an option index,
/// a boolean a true/false pick, a string free text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Choice(usize),
    Text(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    TimedOut,
}

impl AttemptStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "timed_out" => Some(Self::TimedOut),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_index: usize,
    pub submitted_answer: AnswerValue,
    pub is_correct: bool,
    pub points_earned: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub student_id: Uuid,
    pub course_id: Uuid,
    pub attempt_number: i32,
    pub answers: Vec<GradedAnswer>,
    pub score: i32,
    pub total_points: i32,
    pub percentage: i32,
    pub passed: bool,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
}

impl QuizAttempt {
    pub fn begin(quiz: &Quiz, student_id: Uuid, attempt_number: i32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            quiz_id: quiz.id,
            student_id,
            course_id: quiz.course_id,
            attempt_number,
            answers: Vec::new(),
            score: 0,
            total_points: quiz.total_points(),
            percentage: 0,
            passed: false,
            status: AttemptStatus::InProgress,
            started_at: now,
            completed_at: None,
            time_taken_seconds: None,
        }
    }
}

// --- requests ---

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateQuizReq {
    pub course_id: Uuid,
    pub section_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<Question>,
    #[serde(default = "default_passing_score")]
    pub passing_score: i32,
    #[serde(default, alias = "time_limit")]
    pub time_limit_minutes: i32,
    #[serde(default = "unlimited_attempts")]
    pub attempts_allowed: i32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn default_passing_score() -> i32 {
    70
}

const fn unlimited_attempts() -> i32 {
    -1
}

const fn active_by_default() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UpdateQuizReq {
    pub section_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Option<Vec<Question>>,
    pub passing_score: Option<i32>,
    #[serde(alias = "time_limit")]
    pub time_limit_minutes: Option<i32>,
    pub attempts_allowed: Option<i32>,
    pub is_required: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub question_index: usize,
    pub answer: AnswerValue,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmitAttemptReq {
    pub attempt_id: Uuid,
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GrantTeacherReq {
    pub teacher_id: Uuid,
    #[serde(default)]
    pub capabilities: Capabilities,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateTeacherReq {
    pub capabilities: Capabilities,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_union_decodes_by_type() {
        let q: Question = serde_json::from_value(json!({
            "text": "Pick one",
            "type": "mcq",
            "options": ["a", "b", "c"],
            "correct_answer": 2,
            "points": 3
        }))
        .unwrap();
        assert_eq!(
            q.kind,
            QuestionKind::Mcq {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_answer: 2
            }
        );
        assert_eq!(q.points, 3);

        let q: Question = serde_json::from_value(json!({
            "text": "Sky is blue",
            "type": "true-false",
            "correct_answer": true
        }))
        .unwrap();
        assert_eq!(q.kind, QuestionKind::TrueFalse { correct_answer: true });
        assert_eq!(q.points, 1);
    }

    #[test]
    fn question_without_correct_answer_is_rejected() {
        let res: Result<Question, _> = serde_json::from_value(json!({
            "text": "Capital of France",
            "type": "short-answer"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn question_with_mismatched_answer_shape_is_rejected() {
        let res: Result<Question, _> = serde_json::from_value(json!({
            "text": "Sky is blue",
            "type": "true-false",
            "correct_answer": "yes"
        }));
        assert!(res.is_err());
    }

    #[test]
    fn answer_values_decode_to_their_variant() {
        let answers: Vec<AnswerValue> =
            serde_json::from_value(json!([1, true, "Paris"])).unwrap();
        assert_eq!(
            answers,
            vec![
                AnswerValue::Choice(1),
                AnswerValue::Flag(true),
                AnswerValue::Text("Paris".into())
            ]
        );
    }

    #[test]
    fn public_question_hides_answer() {
        let q = Question {
            text: "2 + 2".into(),
            kind: QuestionKind::ShortAnswer {
                correct_answer: "4".into(),
            },
            points: 1,
            explanation: Some("arithmetic".into()),
        };
        let v = serde_json::to_value(q.public()).unwrap();
        assert_eq!(v, json!({"text": "2 + 2", "type": "short-answer", "points": 1}));
    }

    #[test]
    fn mcq_validation_checks_answer_index() {
        let q = Question {
            text: "Pick".into(),
            kind: QuestionKind::Mcq {
                options: vec!["a".into(), "b".into()],
                correct_answer: 2,
            },
            points: 1,
            explanation: None,
        };
        assert!(q.validate(0).is_err());
    }

    #[test]
    fn overflowing_point_total_is_rejected() {
        let q = Question {
            text: "Big".into(),
            kind: QuestionKind::TrueFalse {
                correct_answer: true,
            },
            points: i32::MAX,
            explanation: None,
        };
        assert!(validate_quiz_fields("Quiz", &[q.clone()], 70, 0).is_ok());
        assert_eq!(
            validate_quiz_fields("Quiz", &[q.clone(), q], 70, 0),
            Err("total points too large".to_string())
        );
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(AttemptStatus::InProgress).unwrap(),
            json!("in-progress")
        );
        assert_eq!(AttemptStatus::parse("timed_out"), Some(AttemptStatus::TimedOut));
        assert!(AttemptStatus::TimedOut.is_terminal());
    }
}
