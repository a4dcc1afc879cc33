//! Quiz authoring and listing.

use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    validate_quiz_fields, Course, CreateQuizReq, Principal, Quiz, QuizView, UpdateQuizReq,
};
use crate::permissions::{self, Capability};
use crate::store::Store;
use crate::timing::Clock;

pub(crate) async fn load_course(store: &dyn Store, course_id: Uuid) -> Result<Course> {
    store
        .find_course(course_id)
        .await?
        .ok_or(AppError::NotFound("course"))
}

pub(crate) async fn load_quiz(store: &dyn Store, quiz_id: Uuid) -> Result<Quiz> {
    store
        .find_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("quiz"))
}

/// Load a quiz plus its course and check the caller may author it.
pub(crate) async fn load_authored_quiz(
    store: &dyn Store,
    principal: &Principal,
    quiz_id: Uuid,
) -> Result<(Quiz, Course)> {
    let quiz = load_quiz(store, quiz_id).await?;
    let course = load_course(store, quiz.course_id).await?;
    permissions::require(store, principal, &course, Capability::ManageContent).await?;
    Ok((quiz, course))
}

#[tracing::instrument(skip(store, clock, req), fields(course_id = %req.course_id))]
pub async fn create_quiz(
    store: &dyn Store,
    clock: &dyn Clock,
    principal: &Principal,
    req: CreateQuizReq,
) -> Result<Quiz> {
    let course = load_course(store, req.course_id).await?;
    permissions::require(store, principal, &course, Capability::ManageContent).await?;
    validate_quiz_fields(
        &req.title,
        &req.questions,
        req.passing_score,
        req.time_limit_minutes,
    )
    .map_err(AppError::Validation)?;

    let now = clock.now();
    let quiz = Quiz {
        id: Uuid::new_v4(),
        course_id: course.id,
        section_id: req.section_id,
        title: req.title.trim().to_string(),
        description: req.description,
        questions: req.questions,
        passing_score: req.passing_score,
        time_limit_minutes: req.time_limit_minutes,
        attempts_allowed: req.attempts_allowed,
        is_required: req.is_required,
        is_active: req.is_active,
        created_by: principal.id,
        created_at: now,
        updated_at: now,
    };
    store.insert_quiz(&quiz).await?;
    tracing::info!(quiz_id = %quiz.id, questions = quiz.questions.len(), "quiz created");
    Ok(quiz)
}

/// Partial update. Edits apply to in-progress attempts too: grading always
/// reads the live definition.
#[tracing::instrument(skip(store, clock, req))]
pub async fn update_quiz(
    store: &dyn Store,
    clock: &dyn Clock,
    principal: &Principal,
    quiz_id: Uuid,
    req: UpdateQuizReq,
) -> Result<Quiz> {
    let (mut quiz, _) = load_authored_quiz(store, principal, quiz_id).await?;

    if let Some(section_id) = req.section_id {
        quiz.section_id = Some(section_id);
    }
    if let Some(title) = req.title {
        quiz.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        quiz.description = Some(description);
    }
    if let Some(questions) = req.questions {
        quiz.questions = questions;
    }
    if let Some(passing_score) = req.passing_score {
        quiz.passing_score = passing_score;
    }
    if let Some(time_limit) = req.time_limit_minutes {
        quiz.time_limit_minutes = time_limit;
    }
    if let Some(attempts_allowed) = req.attempts_allowed {
        quiz.attempts_allowed = attempts_allowed;
    }
    if let Some(is_required) = req.is_required {
        quiz.is_required = is_required;
    }
    if let Some(is_active) = req.is_active {
        quiz.is_active = is_active;
    }
    validate_quiz_fields(
        &quiz.title,
        &quiz.questions,
        quiz.passing_score,
        quiz.time_limit_minutes,
    )
    .map_err(AppError::Validation)?;
    quiz.updated_at = clock.now();

    if !store.update_quiz(&quiz).await? {
        return Err(AppError::NotFound("quiz"));
    }
    tracing::info!("quiz updated");
    Ok(quiz)
}

#[tracing::instrument(skip(store))]
pub async fn delete_quiz(store: &dyn Store, principal: &Principal, quiz_id: Uuid) -> Result<()> {
    load_authored_quiz(store, principal, quiz_id).await?;
    if !store.delete_quiz(quiz_id).await? {
        return Err(AppError::NotFound("quiz"));
    }
    tracing::info!("quiz deleted with its attempts");
    Ok(())
}

/// Authors see every quiz in full. Everyone else sees active quizzes only,
/// without answers.
#[tracing::instrument(skip(store))]
pub async fn list_course_quizzes(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
) -> Result<Vec<QuizView>> {
    let course = load_course(store, course_id).await?;
    let quizzes = store.list_quizzes(course_id).await?;
    if permissions::resolve(store, principal, &course, Capability::ManageContent).await? {
        return Ok(quizzes.into_iter().map(QuizView::Full).collect());
    }
    Ok(quizzes
        .iter()
        .filter(|q| q.is_active)
        .map(|q| QuizView::Public(q.public()))
        .collect())
}

#[tracing::instrument(skip(store))]
pub async fn get_quiz(store: &dyn Store, principal: &Principal, quiz_id: Uuid) -> Result<QuizView> {
    let quiz = load_quiz(store, quiz_id).await?;
    let course = load_course(store, quiz.course_id).await?;
    if permissions::resolve(store, principal, &course, Capability::ManageContent).await? {
        return Ok(QuizView::Full(quiz));
    }
    if !quiz.is_active {
        return Err(AppError::NotFound("quiz"));
    }
    Ok(QuizView::Public(quiz.public()))
}
