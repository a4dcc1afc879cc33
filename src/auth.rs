//! Caller identity.
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! as `X-User-Id` and `X-User-Role`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::{self, Header};
use axum_extra::TypedHeader;
use http::{HeaderName, HeaderValue};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Principal, Role};

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
static X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

#[derive(Debug, Clone, Copy)]
pub struct XUserId(pub Uuid);

#[derive(Debug, Clone, Copy)]
pub struct XUserRole(pub Role);

fn single_value<'i, I>(values: &mut I) -> Result<&'i str, headers::Error>
where
    I: Iterator<Item = &'i HeaderValue>,
{
    let value = values.next().ok_or_else(headers::Error::invalid)?;
    value.to_str().map_err(|_| headers::Error::invalid())
}

impl Header for XUserId {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let raw = single_value(values)?;
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| headers::Error::invalid())
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0.to_string()) {
            values.extend(std::iter::once(value));
        }
    }
}

impl Header for XUserRole {
    fn name() -> &'static HeaderName {
        &X_USER_ROLE
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let raw = single_value(values)?;
        Role::parse(raw)
            .map(Self)
            .ok_or_else(headers::Error::invalid)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        values.extend(std::iter::once(HeaderValue::from_static(self.0.as_str())));
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(XUserId(id)) = TypedHeader::<XUserId>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized("missing or invalid X-User-Id header"))?;
        let TypedHeader(XUserRole(role)) =
            TypedHeader::<XUserRole>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("missing or invalid X-User-Role header"))?;
        Ok(Self::new(id, role))
    }
}
