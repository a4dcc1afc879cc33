//! In-process store.
//!
//! Holds everything behind one async mutex, which also makes attempt start
//! atomic. Used by the test suite and for embedding without Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AttemptLedger, CapabilityStore, CourseDirectory, QuizStore, StartOutcome};
use crate::error::{AppError, Result};
use crate::models::{AttemptStatus, Course, Quiz, QuizAttempt};
use crate::permissions::{Capabilities, CapabilityGrant};

#[derive(Default)]
struct Inner {
    courses: HashMap<Uuid, Course>,
    enrollments: HashSet<(Uuid, Uuid)>,
    grants: HashMap<(Uuid, Uuid), CapabilityGrant>,
    quizzes: HashMap<Uuid, Quiz>,
    attempts: HashMap<Uuid, QuizAttempt>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_course(&self, course: Course) {
        self.inner.lock().await.courses.insert(course.id, course);
    }

    pub async fn enroll(&self, course_id: Uuid, student_id: Uuid) {
        self.inner
            .lock()
            .await
            .enrollments
            .insert((course_id, student_id));
    }
}

fn newest_first(mut attempts: Vec<QuizAttempt>) -> Vec<QuizAttempt> {
    attempts.sort_by(|a, b| {
        b.attempt_number
            .cmp(&a.attempt_number)
            .then(b.started_at.cmp(&a.started_at))
    });
    attempts
}

#[async_trait]
impl CourseDirectory for MemoryStore {
    async fn find_course(&self, course_id: Uuid) -> Result<Option<Course>> {
        Ok(self.inner.lock().await.courses.get(&course_id).copied())
    }

    async fn is_enrolled(&self, course_id: Uuid, student_id: Uuid) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .enrollments
            .contains(&(course_id, student_id)))
    }
}

#[async_trait]
impl CapabilityStore for MemoryStore {
    async fn find_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Option<CapabilityGrant>> {
        Ok(self
            .inner
            .lock()
            .await
            .grants
            .get(&(course_id, teacher_id))
            .cloned())
    }

    async fn list_grants(&self, course_id: Uuid) -> Result<Vec<CapabilityGrant>> {
        let inner = self.inner.lock().await;
        let mut grants: Vec<_> = inner
            .grants
            .values()
            .filter(|g| g.course_id == course_id)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    async fn insert_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
        granted_by: Uuid,
        capabilities: Capabilities,
    ) -> Result<CapabilityGrant> {
        let mut inner = self.inner.lock().await;
        if inner.grants.contains_key(&(course_id, teacher_id)) {
            return Err(AppError::AlreadyExists("teacher grant"));
        }
        let now = Utc::now();
        let grant = CapabilityGrant {
            course_id,
            teacher_id,
            granted_by,
            capabilities,
            created_at: now,
            updated_at: now,
        };
        inner.grants.insert((course_id, teacher_id), grant.clone());
        Ok(grant)
    }

    async fn update_grant(
        &self,
        course_id: Uuid,
        teacher_id: Uuid,
        capabilities: Capabilities,
    ) -> Result<Option<CapabilityGrant>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.grants.get_mut(&(course_id, teacher_id)).map(|g| {
            g.capabilities = capabilities;
            g.updated_at = Utc::now();
            g.clone()
        }))
    }

    async fn delete_grant(&self, course_id: Uuid, teacher_id: Uuid) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .grants
            .remove(&(course_id, teacher_id))
            .is_some())
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn insert_quiz(&self, quiz: &Quiz) -> Result<()> {
        self.inner.lock().await.quizzes.insert(quiz.id, quiz.clone());
        Ok(())
    }

    async fn find_quiz(&self, quiz_id: Uuid) -> Result<Option<Quiz>> {
        Ok(self.inner.lock().await.quizzes.get(&quiz_id).cloned())
    }

    async fn list_quizzes(&self, course_id: Uuid) -> Result<Vec<Quiz>> {
        let inner = self.inner.lock().await;
        let mut quizzes: Vec<_> = inner
            .quizzes
            .values()
            .filter(|q| q.course_id == course_id)
            .cloned()
            .collect();
        quizzes.sort_by_key(|q| q.created_at);
        Ok(quizzes)
    }

    async fn update_quiz(&self, quiz: &Quiz) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.quizzes.get_mut(&quiz.id) {
            Some(stored) => {
                *stored = quiz.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_quiz(&self, quiz_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let removed = inner.quizzes.remove(&quiz_id).is_some();
        inner.attempts.retain(|_, a| a.quiz_id != quiz_id);
        Ok(removed)
    }
}

#[async_trait]
impl AttemptLedger for MemoryStore {
    async fn start_attempt(
        &self,
        quiz: &Quiz,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StartOutcome> {
        let mut inner = self.inner.lock().await;
        let mine: Vec<&QuizAttempt> = inner
            .attempts
            .values()
            .filter(|a| a.quiz_id == quiz.id && a.student_id == student_id)
            .collect();

        if let Some(active) = mine.iter().find(|a| a.status == AttemptStatus::InProgress) {
            return Ok(StartOutcome::Resumed((*active).clone()));
        }
        let total = mine.len();
        let terminal = mine.iter().filter(|a| a.status.is_terminal()).count();
        if let Some(allowed) = quiz.attempt_limit() {
            if terminal >= allowed as usize {
                return Ok(StartOutcome::LimitReached);
            }
        }

        let attempt = QuizAttempt::begin(quiz, student_id, total as i32 + 1, now);
        inner.attempts.insert(attempt.id, attempt.clone());
        Ok(StartOutcome::Created(attempt))
    }

    async fn find_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizAttempt>> {
        Ok(self.inner.lock().await.attempts.get(&attempt_id).cloned())
    }

    async fn close_attempt(&self, attempt: &QuizAttempt) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        match inner.attempts.get_mut(&attempt.id) {
            Some(stored) if stored.status == AttemptStatus::InProgress => {
                *stored = attempt.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn student_attempts(&self, quiz_id: Uuid, student_id: Uuid) -> Result<Vec<QuizAttempt>> {
        let inner = self.inner.lock().await;
        Ok(newest_first(
            inner
                .attempts
                .values()
                .filter(|a| a.quiz_id == quiz_id && a.student_id == student_id)
                .cloned()
                .collect(),
        ))
    }

    async fn quiz_attempts(
        &self,
        quiz_id: Uuid,
        status: Option<AttemptStatus>,
    ) -> Result<Vec<QuizAttempt>> {
        let inner = self.inner.lock().await;
        Ok(newest_first(
            inner
                .attempts
                .values()
                .filter(|a| a.quiz_id == quiz_id)
                .filter(|a| status.map_or(true, |s| a.status == s))
                .cloned()
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Question, QuestionKind};
    use std::sync::Arc;

    fn quiz(attempts_allowed: i32) -> Quiz {
        Quiz {
            id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            section_id: None,
            title: "Quiz".into(),
            description: None,
            questions: vec![Question {
                text: "Sky is blue".into(),
                kind: QuestionKind::TrueFalse {
                    correct_answer: true,
                },
                points: 1,
                explanation: None,
            }],
            passing_score: 50,
            time_limit_minutes: 0,
            attempts_allowed,
            is_required: false,
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn finished(mut attempt: QuizAttempt) -> QuizAttempt {
        attempt.status = AttemptStatus::Completed;
        attempt.completed_at = Some(Utc::now());
        attempt
    }

    #[tokio::test]
    async fn start_resumes_active_attempt() {
        let store = MemoryStore::new();
        let q = quiz(-1);
        let student = Uuid::new_v4();
        let StartOutcome::Created(first) = store.start_attempt(&q, student, Utc::now()).await.unwrap()
        else {
            panic!("expected a new attempt");
        };
        let again = store.start_attempt(&q, student, Utc::now()).await.unwrap();
        assert_eq!(again, StartOutcome::Resumed(first));
    }

    #[tokio::test]
    async fn start_respects_terminal_ceiling() {
        let store = MemoryStore::new();
        let q = quiz(1);
        let student = Uuid::new_v4();
        let StartOutcome::Created(first) = store.start_attempt(&q, student, Utc::now()).await.unwrap()
        else {
            panic!("expected a new attempt");
        };
        assert!(store.close_attempt(&finished(first)).await.unwrap());
        assert_eq!(
            store.start_attempt(&q, student, Utc::now()).await.unwrap(),
            StartOutcome::LimitReached
        );
    }

    #[tokio::test]
    async fn zero_attempts_allowed_blocks_everything() {
        let store = MemoryStore::new();
        let q = quiz(0);
        assert_eq!(
            store.start_attempt(&q, Uuid::new_v4(), Utc::now()).await.unwrap(),
            StartOutcome::LimitReached
        );
    }

    #[tokio::test]
    async fn close_is_compare_and_swap() {
        let store = MemoryStore::new();
        let q = quiz(-1);
        let StartOutcome::Created(a) = store
            .start_attempt(&q, Uuid::new_v4(), Utc::now())
            .await
            .unwrap()
        else {
            panic!("expected a new attempt");
        };
        let done = finished(a);
        assert!(store.close_attempt(&done).await.unwrap());
        assert!(!store.close_attempt(&done).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_starts_open_one_attempt() {
        let store = Arc::new(MemoryStore::new());
        let q = Arc::new(quiz(3));
        let student = Uuid::new_v4();

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = Arc::clone(&store);
                let q = Arc::clone(&q);
                tokio::spawn(async move { store.start_attempt(&q, student, Utc::now()).await })
            })
            .collect();

        let mut created = 0;
        for h in handles {
            if let StartOutcome::Created(_) = h.await.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        let active = store
            .quiz_attempts(q.id, Some(AttemptStatus::InProgress))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn deleting_quiz_cascades_attempts() {
        let store = MemoryStore::new();
        let q = quiz(-1);
        store.insert_quiz(&q).await.unwrap();
        store
            .start_attempt(&q, Uuid::new_v4(), Utc::now())
            .await
            .unwrap();
        assert!(store.delete_quiz(q.id).await.unwrap());
        assert!(store.quiz_attempts(q.id, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_grant_is_rejected() {
        let store = MemoryStore::new();
        let (course, teacher, owner) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_grant(course, teacher, owner, Capabilities::none())
            .await
            .unwrap();
        let err = store
            .insert_grant(course, teacher, owner, Capabilities::all())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }
}
