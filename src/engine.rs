//! Quiz attempt lifecycle.
//!
//! `in-progress -> completed` on a timely submit, `in-progress -> timed-out`
//! on a late one. Both end states are terminal.

use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{self, QuizAnalytics};
use crate::error::{AppError, Result};
use crate::grading::{self, GradeResult};
use crate::models::{AttemptStatus, Principal, PublicQuiz, QuizAttempt, SubmitAttemptReq};
use crate::quizzes::{load_authored_quiz, load_quiz};
use crate::store::{StartOutcome, Store};
use crate::timing::{self, Clock};

#[derive(Debug, Clone, Serialize)]
pub struct StartedAttempt {
    pub attempt: QuizAttempt,
    pub quiz: PublicQuiz,
    pub resumed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedAttempt {
    pub attempt: QuizAttempt,
    pub result: GradeResult,
    pub feedback: Vec<AnswerFeedback>,
}

/// Explanation for a graded question, when the author wrote one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub question_index: usize,
    pub is_correct: bool,
    pub explanation: String,
}

#[tracing::instrument(skip(store, clock))]
pub async fn start_attempt(
    store: &dyn Store,
    clock: &dyn Clock,
    principal: &Principal,
    quiz_id: Uuid,
) -> Result<StartedAttempt> {
    let quiz = load_quiz(store, quiz_id).await?;
    if !quiz.is_active {
        return Err(AppError::InvalidState("quiz is not active".into()));
    }
    if !store.is_enrolled(quiz.course_id, principal.id).await? {
        return Err(AppError::Forbidden("course enrollment"));
    }

    let (attempt, resumed) = match store.start_attempt(&quiz, principal.id, clock.now()).await? {
        StartOutcome::Created(attempt) => {
            tracing::info!(attempt_id = %attempt.id, number = attempt.attempt_number, "attempt started");
            (attempt, false)
        }
        StartOutcome::Resumed(attempt) => {
            tracing::info!(attempt_id = %attempt.id, "attempt resumed");
            (attempt, true)
        }
        StartOutcome::LimitReached => {
            tracing::warn!(allowed = quiz.attempts_allowed, "attempt limit reached");
            return Err(AppError::AttemptLimitExceeded {
                allowed: quiz.attempts_allowed,
            });
        }
    };

    Ok(StartedAttempt {
        attempt,
        quiz: quiz.public(),
        resumed,
    })
}

/// Grade and close an attempt.
///
/// A submission past the deadline plus grace closes the attempt as
/// `timed-out` with a zero score, without grading, and fails with
/// `TimeLimitExceeded`. The attempt still counts toward the limit.
#[tracing::instrument(skip(store, clock, req), fields(attempt_id = %req.attempt_id))]
pub async fn submit_attempt(
    store: &dyn Store,
    clock: &dyn Clock,
    principal: &Principal,
    quiz_id: Uuid,
    req: SubmitAttemptReq,
) -> Result<SubmittedAttempt> {
    let mut attempt = store
        .find_attempt(req.attempt_id)
        .await?
        .filter(|a| a.quiz_id == quiz_id)
        .ok_or(AppError::NotFound("attempt"))?;
    if attempt.student_id != principal.id {
        return Err(AppError::Forbidden("attempt ownership"));
    }
    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::AlreadySubmitted);
    }
    let quiz = load_quiz(store, attempt.quiz_id).await?;

    let now = clock.now();
    let elapsed = timing::elapsed_seconds(attempt.started_at, now);
    attempt.completed_at = Some(now);
    attempt.time_taken_seconds = Some(elapsed);

    if timing::is_past_deadline(quiz.time_limit_minutes, attempt.started_at, now) {
        attempt.status = AttemptStatus::TimedOut;
        if !store.close_attempt(&attempt).await? {
            return Err(AppError::AlreadySubmitted);
        }
        tracing::warn!(elapsed, limit = quiz.time_limit_minutes, "attempt timed out");
        return Err(AppError::TimeLimitExceeded {
            limit_minutes: quiz.time_limit_minutes,
        });
    }

    let result = grading::grade(&quiz, &req.answers);
    attempt.answers = result.graded_answers.clone();
    attempt.score = result.score;
    attempt.total_points = result.total_points;
    attempt.percentage = result.percentage;
    attempt.passed = result.passed;
    attempt.status = AttemptStatus::Completed;

    if !store.close_attempt(&attempt).await? {
        return Err(AppError::AlreadySubmitted);
    }
    tracing::info!(
        score = result.score,
        total = result.total_points,
        passed = result.passed,
        "attempt graded"
    );

    let feedback = result
        .graded_answers
        .iter()
        .filter_map(|g| {
            let explanation = quiz.questions.get(g.question_index)?.explanation.clone()?;
            Some(AnswerFeedback {
                question_index: g.question_index,
                is_correct: g.is_correct,
                explanation,
            })
        })
        .collect();

    Ok(SubmittedAttempt {
        attempt,
        result,
        feedback,
    })
}

#[tracing::instrument(skip(store))]
pub async fn my_attempts(
    store: &dyn Store,
    principal: &Principal,
    quiz_id: Uuid,
) -> Result<Vec<QuizAttempt>> {
    load_quiz(store, quiz_id).await?;
    store.student_attempts(quiz_id, principal.id).await
}

#[tracing::instrument(skip(store))]
pub async fn quiz_analytics(
    store: &dyn Store,
    principal: &Principal,
    quiz_id: Uuid,
) -> Result<QuizAnalytics> {
    let (quiz, _) = load_authored_quiz(store, principal, quiz_id).await?;
    let attempts = store
        .quiz_attempts(quiz_id, Some(AttemptStatus::Completed))
        .await?;
    Ok(analytics::summarize(&quiz, &attempts))
}
