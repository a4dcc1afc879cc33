//! Reusable helpers for HTTP integration tests.
//!
//! `TestApp` drives the full axum router with `tower::ServiceExt::oneshot`
//! over an in-memory store and a manual clock.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use course_quiz::models::{Course, Role};
use course_quiz::routes::AppState;
use course_quiz::store::MemoryStore;
use course_quiz::timing::ManualClock;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
    pub role: Role,
}

impl User {
    pub fn new(role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let state = AppState::with_clock(store.clone(), clock.clone());
        let router = course_quiz::app(state, 1024 * 1024);
        Self {
            router,
            store,
            clock,
        }
    }

    /// Create a course owned by a fresh instructor.
    pub async fn course(&self) -> (Uuid, User) {
        let owner = User::new(Role::Instructor);
        let course = Course {
            id: Uuid::new_v4(),
            owner_id: owner.id,
        };
        self.store.add_course(course).await;
        (course.id, owner)
    }

    pub async fn enrolled_student(&self, course_id: Uuid) -> User {
        let student = User::new(Role::Student);
        self.store.enroll(course_id, student.id).await;
        student
    }

    pub fn advance(&self, minutes: i64) {
        self.clock.advance(Duration::minutes(minutes));
    }

    pub fn advance_millis(&self, millis: i64) {
        self.clock.advance(Duration::milliseconds(millis));
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<User>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            req = req
                .header("x-user-id", user.id.to_string())
                .header("x-user-role", user.role.as_str());
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .expect("request");

        let resp = self.router.clone().oneshot(req).await.expect("response");
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, user: User) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(user), None).await
    }

    pub async fn post(&self, uri: &str, user: User, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(user), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user: User, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(user), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user: User) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(user), None).await
    }

    /// Create a quiz as `author` and return its id.
    pub async fn create_quiz(&self, author: User, body: Value) -> Uuid {
        let (status, quiz) = self.post("/api/quizzes", author, body).await;
        assert_eq!(status, StatusCode::CREATED, "create quiz failed: {quiz}");
        quiz["id"].as_str().expect("quiz id").parse().expect("uuid")
    }

    pub async fn start(&self, quiz_id: Uuid, student: User) -> (StatusCode, Value) {
        self.post(&format!("/api/quizzes/{quiz_id}/start"), student, json!({}))
            .await
    }

    pub async fn submit(
        &self,
        quiz_id: Uuid,
        student: User,
        attempt_id: &str,
        answers: Value,
    ) -> (StatusCode, Value) {
        self.post(
            &format!("/api/quizzes/{quiz_id}/submit"),
            student,
            json!({ "attempt_id": attempt_id, "answers": answers }),
        )
        .await
    }
}

/// Two single-point mcq questions; correct answers are 0 and 2.
pub fn two_mcq_quiz(course_id: Uuid) -> Value {
    json!({
        "course_id": course_id,
        "title": "Basics",
        "passing_score": 50,
        "questions": [
            { "text": "First", "type": "mcq", "options": ["a", "b", "c"], "correct_answer": 0, "points": 1 },
            { "text": "Second", "type": "mcq", "options": ["a", "b", "c"], "correct_answer": 2, "points": 1,
              "explanation": "c is the only prime" }
        ]
    })
}
