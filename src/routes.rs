use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    analytics::QuizAnalytics,
    engine::{self, StartedAttempt, SubmittedAttempt},
    error::AppError,
    models::*,
    permissions::CapabilityGrant,
    quizzes,
    store::Store,
    teachers::{self, MyPermissions},
    timing::{Clock, SystemClock},
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;
type JsonBody<T> = WithRejection<Json<T>, AppError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        // quiz authoring
        .route("/api/quizzes", post(create_quiz))
        .route("/api/quizzes/course/:course_id", get(list_course_quizzes))
        .route(
            "/api/quizzes/:quiz_id",
            get(get_quiz).put(update_quiz).delete(delete_quiz),
        )
        // attempts
        .route("/api/quizzes/:quiz_id/start", post(start_attempt))
        .route("/api/quizzes/:quiz_id/submit", post(submit_attempt))
        .route("/api/quizzes/:quiz_id/my-attempts", get(my_attempts))
        .route("/api/quizzes/:quiz_id/analytics", get(quiz_analytics))
        // course staff
        .route("/api/courses/:course_id/my-permissions", get(my_permissions))
        .route(
            "/api/courses/:course_id/teachers",
            get(list_teachers).post(add_teacher),
        )
        .route("/api/courses/:course_id/teachers/leave", delete(leave_course))
        .route(
            "/api/courses/:course_id/teachers/:teacher_id",
            put(update_teacher).delete(remove_teacher),
        )
        .with_state(state)
}

// --- quizzes ---

async fn create_quiz(
    State(st): State<AppState>,
    principal: Principal,
    WithRejection(Json(req), _): JsonBody<CreateQuizReq>,
) -> Result<(StatusCode, Json<Quiz>), AppError> {
    let quiz = quizzes::create_quiz(st.store.as_ref(), st.clock.as_ref(), &principal, req).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

async fn list_course_quizzes(
    State(st): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<QuizView>> {
    Ok(Json(
        quizzes::list_course_quizzes(st.store.as_ref(), &principal, course_id).await?,
    ))
}

async fn get_quiz(
    State(st): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<QuizView> {
    Ok(Json(
        quizzes::get_quiz(st.store.as_ref(), &principal, quiz_id).await?,
    ))
}

async fn update_quiz(
    State(st): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<Uuid>,
    WithRejection(Json(req), _): JsonBody<UpdateQuizReq>,
) -> ApiResult<Quiz> {
    Ok(Json(
        quizzes::update_quiz(st.store.as_ref(), st.clock.as_ref(), &principal, quiz_id, req)
            .await?,
    ))
}

async fn delete_quiz(
    State(st): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    quizzes::delete_quiz(st.store.as_ref(), &principal, quiz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- attempts ---

async fn start_attempt(
    State(st): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<StartedAttempt> {
    Ok(Json(
        engine::start_attempt(st.store.as_ref(), st.clock.as_ref(), &principal, quiz_id).await?,
    ))
}

async fn submit_attempt(
    State(st): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<Uuid>,
    WithRejection(Json(req), _): JsonBody<SubmitAttemptReq>,
) -> ApiResult<SubmittedAttempt> {
    Ok(Json(
        engine::submit_attempt(st.store.as_ref(), st.clock.as_ref(), &principal, quiz_id, req)
            .await?,
    ))
}

async fn my_attempts(
    State(st): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<Vec<QuizAttempt>> {
    Ok(Json(
        engine::my_attempts(st.store.as_ref(), &principal, quiz_id).await?,
    ))
}

async fn quiz_analytics(
    State(st): State<AppState>,
    principal: Principal,
    Path(quiz_id): Path<Uuid>,
) -> ApiResult<QuizAnalytics> {
    Ok(Json(
        engine::quiz_analytics(st.store.as_ref(), &principal, quiz_id).await?,
    ))
}

// --- course staff ---

async fn my_permissions(
    State(st): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> ApiResult<MyPermissions> {
    Ok(Json(
        teachers::my_permissions(st.store.as_ref(), &principal, course_id).await?,
    ))
}

async fn list_teachers(
    State(st): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Vec<CapabilityGrant>> {
    Ok(Json(
        teachers::list_teachers(st.store.as_ref(), &principal, course_id).await?,
    ))
}

async fn add_teacher(
    State(st): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
    WithRejection(Json(req), _): JsonBody<GrantTeacherReq>,
) -> Result<(StatusCode, Json<CapabilityGrant>), AppError> {
    let grant = teachers::add_teacher(st.store.as_ref(), &principal, course_id, req).await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

async fn update_teacher(
    State(st): State<AppState>,
    principal: Principal,
    Path((course_id, teacher_id)): Path<(Uuid, Uuid)>,
    WithRejection(Json(req), _): JsonBody<UpdateTeacherReq>,
) -> ApiResult<CapabilityGrant> {
    Ok(Json(
        teachers::update_teacher(st.store.as_ref(), &principal, course_id, teacher_id, req)
            .await?,
    ))
}

async fn remove_teacher(
    State(st): State<AppState>,
    principal: Principal,
    Path((course_id, teacher_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    teachers::remove_teacher(st.store.as_ref(), &principal, course_id, teacher_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_course(
    State(st): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    teachers::leave_course(st.store.as_ref(), &principal, course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
