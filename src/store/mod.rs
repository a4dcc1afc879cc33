//! Persistence seams.
//!
//! Courses and enrollments belong to external collaborators and are only
//! read. Grants, quizzes and attempts are owned here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AttemptStatus, Course, Quiz, QuizAttempt};
use crate::permissions::{Capabilities, CapabilityGrant};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait CourseDirectory: Send + Sync {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>>;
    async fn is_enrolled(&self, course_id: Uuid, student_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CapabilityStore: Send + Sync {
    async fn find_grant(&self, course_id: Uuid, teacher_id: Uuid)
        -> Result<Option<CapabilityGrant>>;
    async fn list_grants(&self, course_id: Uuid) -> Result<Vec<CapabilityGrant>>;
    /// Fails with `AlreadyExists` when the pair already holds a grant.
    async fn insert_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
        granted_by: Uuid,
        capabilities: Capabilities,
    ) -> Result<CapabilityGrant>;
    async fn update_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
        capabilities: Capabilities,
    ) -> Result<Option<CapabilityGrant>>;
    /// Returns `false` when there was nothing to delete.
    async fn delete_grant(&self, course_id: Uuid, teacher_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<()>;
    async fn find_quiz(&self, quiz_id: Uuid) -> Result<Option<Quiz>>;
    async fn list_quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>>;
    async fn update_quiz(&self, quiz: &Quiz) -> Result<bool>;
    /// Deletes the quiz together with all of its attempts.
    async fn delete_quiz(&self, quiz_id: Uuid) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Created(QuizAttempt),
    Resumed(QuizAttempt),
    LimitReached,
}

#[async_trait]
pub trait AttemptLedger: Send + Sync {
    /// Atomic check-and-create: resume the student's in-progress attempt,
    /// refuse when the terminal-attempt ceiling is hit, else open a new one.
    async fn start_attempt(
        &self,
        quiz: &Quiz,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome>;
    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizAttempt>>;
    /// Compare-and-swap write of a finished attempt. Only succeeds while the
    /// stored attempt is still in progress.
    async fn close_attempt(&self, attempt: &QuizAttempt) -> Result<bool>;
    /// Newest first.
    async fn student_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<QuizAttempt>>;
    async fn quiz_attempts(
        &self,
        quiz_id: Uuid,
        status: Option<AttemptStatus>,
    ) -> Result<Vec<QuizAttempt>>;
}

pub trait Store: CourseDirectory + CapabilityStore + QuizStore + AttemptLedger {}

impl<T> Store for T where T: CourseDirectory + CapabilityStore + QuizStore + AttemptLedger {}
