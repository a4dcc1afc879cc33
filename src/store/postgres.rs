//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{AttemptLedger, CapabilityStore, CourseDirectory, QuizStore, StartOutcome};
use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::{AttemptStatus, Course, GradedAnswer, Question, Quiz, QuizAttempt};
use crate::permissions::{Capabilities, CapabilityGrant};

const GRANT_COLUMNS: &str = "course_id, teacher_id, granted_by, manage_content, manage_students, \
     full_access, manage_teachers, created_at, updated_at";

const QUIZ_COLUMNS: &str = "id, course_id, section_id, title, description, questions, \
     passing_score, time_limit_minutes, attempts_allowed, is_required, is_active, created_by, \
     created_at, updated_at";

const ATTEMPT_COLUMNS: &str = "id, quiz_id, student_id, course_id, attempt_number, answers, \
     score, total_points, percentage, passed, status, started_at, completed_at, time_taken_seconds";

#[derive(Clone)]
pub struct PgStore {
    pool: Db,
}

impl PgStore {
    pub const fn new(pool: Db) -> Self {
        Self { pool }
    }

    pub const fn pool(&self) -> &Db {
        &self.pool
    }

    async fn try_start_attempt(
        &self,
        quiz: &Quiz,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome> {
        let mut tx = self.pool.begin().await?;

        // serializes concurrent starts for the same (student, quiz) until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("quiz-attempt:{student_id}:{}", quiz.id))
            .execute(&mut *tx)
            .await?;

        let active: Option<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
             WHERE quiz_id = $1 AND student_id = $2 AND status = 'in_progress'"
        ))
        .bind(quiz.id)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(row) = active {
            tx.commit().await?;
            return Ok(StartOutcome::Resumed(row.try_into()?));
        }

        let (total, terminal): (i64, i64) = sqlx::query_as(
            r"
            SELECT COUNT(*), COUNT(*) FILTER (WHERE status <> 'in_progress')
            FROM quiz_attempts
            WHERE quiz_id = $1 AND student_id = $2
            ",
        )
        .bind(quiz.id)
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(allowed) = quiz.attempt_limit() {
            if terminal >= i64::from(allowed) {
                return Ok(StartOutcome::LimitReached);
            }
        }

        let attempt = QuizAttempt::begin(quiz, student_id, total as i32 + 1, now);
        sqlx::query(
            r"
            INSERT INTO quiz_attempts
                (id, quiz_id, student_id, course_id, attempt_number, answers, score,
                 total_points, percentage, passed, status, started_at)
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, 0, false, 'in_progress', $8)
            ",
        )
        .bind(attempt.id)
        .bind(attempt.quiz_id)
        .bind(attempt.student_id)
        .bind(attempt.course_id)
        .bind(attempt.attempt_number)
        .bind(Json(&attempt.answers))
        .bind(attempt.total_points)
        .bind(attempt.started_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(StartOutcome::Created(attempt))
    }
}

fn is_unique_violation(err: &AppError) -> bool {
    matches!(err, AppError::Database(sqlx::Error::Database(db)) if db.is_unique_violation())
}

// --- rows ---

#[derive(FromRow)]
struct QuizRow {
    id: Uuid,
    course_id: Uuid,
    section_id: Option<Uuid>,
    title: String,
    description: Option<String>,
    questions: Json<Vec<Question>>,
    passing_score: i32,
    time_limit_minutes: i32,
    attempts_allowed: i32,
    is_required: bool,
    is_active: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuizRow> for Quiz {
    fn from(row: QuizRow) -> Self {
        Self {
            id: row.id,
            course_id: row.course_id,
            section_id: row.section_id,
            title: row.title,
            description: row.description,
            questions: row.questions.0,
            passing_score: row.passing_score,
            time_limit_minutes: row.time_limit_minutes,
            attempts_allowed: row.attempts_allowed,
            is_required: row.is_required,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    quiz_id: Uuid,
    student_id: Uuid,
    course_id: Uuid,
    attempt_number: i32,
    answers: Json<Vec<GradedAnswer>>,
    score: i32,
    total_points: i32,
    percentage: i32,
    passed: bool,
    status: String,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    time_taken_seconds: Option<i64>,
}

impl TryFrom<AttemptRow> for QuizAttempt {
    type Error = AppError;

    fn try_from(row: AttemptRow) -> Result<Self> {
        let status = AttemptStatus::parse(&row.status)
            .ok_or_else(|| AppError::Internal(format!("unknown attempt status {}", row.status)))?;
        Ok(Self {
            id: row.id,
            quiz_id: row.quiz_id,
            student_id: row.student_id,
            course_id: row.course_id,
            attempt_number: row.attempt_number,
            answers: row.answers.0,
            score: row.score,
            total_points: row.total_points,
            percentage: row.percentage,
            passed: row.passed,
            status,
            started_at: row.started_at,
            completed_at: row.completed_at,
            time_taken_seconds: row.time_taken_seconds,
        })
    }
}

fn attempts_from_rows(rows: Vec<AttemptRow>) -> Result<Vec<QuizAttempt>> {
    rows.into_iter().map(QuizAttempt::try_from).collect()
}

// --- courses (read-only) ---

#[async_trait]
impl CourseDirectory for PgStore {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        Ok(
            sqlx::query_as::<_, Course>("SELECT id, owner_id FROM courses WHERE id = $1")
                .bind(course_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn is_enrolled(&self, course_id: Uuid, student_id: Uuid) -> Result<bool> {
        let (enrolled,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM enrollments WHERE course_id = $1 AND student_id = $2)",
        )
        .bind(course_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrolled)
    }
}

// --- grants ---

#[async_trait]
impl CapabilityStore for PgStore {
    async fn find_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Option<CapabilityGrant>> {
        Ok(sqlx::query_as::<_, CapabilityGrant>(&format!(
            "SELECT {GRANT_COLUMNS} FROM course_teachers WHERE course_id = $1 AND teacher_id = $2"
        ))
        .bind(course_id)
        .bind(teacher_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_grants(&self, course_id: Uuid) -> Result<Vec<CapabilityGrant>> {
        Ok(sqlx::query_as::<_, CapabilityGrant>(&format!(
            "SELECT {GRANT_COLUMNS} FROM course_teachers WHERE course_id = $1 ORDER BY created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
        granted_by: Uuid,
        capabilities: Capabilities,
    ) -> Result<CapabilityGrant> {
        sqlx::query_as::<_, CapabilityGrant>(&format!(
            r"
            INSERT INTO course_teachers
                (course_id, teacher_id, granted_by, manage_content, manage_students,
                 full_access, manage_teachers)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (course_id, teacher_id) DO NOTHING
            RETURNING {GRANT_COLUMNS}
            "
        ))
        .bind(course_id)
        .bind(teacher_id)
        .bind(granted_by)
        .bind(capabilities.manage_content)
        .bind(capabilities.manage_students)
        .bind(capabilities.full_access)
        .bind(capabilities.manage_teachers)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::AlreadyExists("teacher grant"))
    }

    async fn update_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
        capabilities: Capabilities,
    ) -> Result<Option<CapabilityGrant>> {
        Ok(sqlx::query_as::<_, CapabilityGrant>(&format!(
            r"
            UPDATE course_teachers
            SET manage_content = $3, manage_students = $4, full_access = $5,
                manage_teachers = $6, updated_at = now()
            WHERE course_id = $1 AND teacher_id = $2
            RETURNING {GRANT_COLUMNS}
            "
        ))
        .bind(course_id)
        .bind(teacher_id)
        .bind(capabilities.manage_content)
        .bind(capabilities.manage_students)
        .bind(capabilities.full_access)
        .bind(capabilities.manage_teachers)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_grant(&self, course_id: Uuid, teacher_id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM course_teachers WHERE course_id = $1 AND teacher_id = $2")
                .bind(course_id)
                .bind(teacher_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- quizzes ---

#[async_trait]
impl QuizStore for PgStore {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<()> {
        sqlx::query(&format!(
            r"
            INSERT INTO quizzes ({QUIZ_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "
        ))
        .bind(quiz.id)
        .bind(quiz.course_id)
        .bind(quiz.section_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(Json(&quiz.questions))
        .bind(quiz.passing_score)
        .bind(quiz.time_limit_minutes)
        .bind(quiz.attempts_allowed)
        .bind(quiz.is_required)
        .bind(quiz.is_active)
        .bind(quiz.created_by)
        .bind(quiz.created_at)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_quiz(&self, quiz_id: Uuid) -> Result<Option<Quiz>> {
        let row: Option<QuizRow> =
            sqlx::query_as(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
                .bind(quiz_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Quiz::from))
    }

    async fn list_quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>> {
        let rows: Vec<QuizRow> = sqlx::query_as(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE course_id = $1 ORDER BY created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Quiz::from).collect())
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE quizzes
            SET section_id = $2, title = $3, description = $4, questions = $5,
                passing_score = $6, time_limit_minutes = $7, attempts_allowed = $8,
                is_required = $9, is_active = $10, updated_at = $11
            WHERE id = $1
            ",
        )
        .bind(quiz.id)
        .bind(quiz.section_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(Json(&quiz.questions))
        .bind(quiz.passing_score)
        .bind(quiz.time_limit_minutes)
        .bind(quiz.attempts_allowed)
        .bind(quiz.is_required)
        .bind(quiz.is_active)
        .bind(quiz.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_quiz(&self, quiz_id: Uuid) -> Result<bool> {
        // quiz_attempts.quiz_id is ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- attempts ---

#[async_trait]
impl AttemptLedger for PgStore {
    async fn start_attempt(
        &self,
        quiz: &Quiz,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome> {
        match self.try_start_attempt(quiz, student_id, now).await {
            // the partial unique index caught a racing insert; the retry resumes it
            Err(e) if is_unique_violation(&e) => {
                tracing::warn!(quiz_id = %quiz.id, %student_id, "start conflict, retrying once");
                self.try_start_attempt(quiz, student_id, now).await
            }
            other => other,
        }
    }

    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizAttempt>> {
        let row: Option<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1"
        ))
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(QuizAttempt::try_from).transpose()
    }

    async fn close_attempt(&self, attempt: &QuizAttempt) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE quiz_attempts
            SET answers = $2, score = $3, total_points = $4, percentage = $5, passed = $6,
                status = $7, completed_at = $8, time_taken_seconds = $9
            WHERE id = $1 AND status = 'in_progress'
            ",
        )
        .bind(attempt.id)
        .bind(Json(&attempt.answers))
        .bind(attempt.score)
        .bind(attempt.total_points)
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(attempt.status.as_str())
        .bind(attempt.completed_at)
        .bind(attempt.time_taken_seconds)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn student_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<QuizAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
             WHERE quiz_id = $1 AND student_id = $2 \
             ORDER BY attempt_number DESC, started_at DESC"
        ))
        .bind(quiz_id)
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        attempts_from_rows(rows)
    }

    async fn quiz_attempts(
        &self,
        quiz_id: Uuid,
        status: Option<AttemptStatus>,
    ) -> Result<Vec<QuizAttempt>> {
        let rows: Vec<AttemptRow> = sqlx::query_as(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
             WHERE quiz_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY attempt_number DESC, started_at DESC"
        ))
        .bind(quiz_id)
        .bind(status.map(AttemptStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        attempts_from_rows(rows)
    }
}
