//! Permission resolution.
//!
//! Every capability-gated operation goes through [`resolve`] (or [`require`])
//! with a named [`Capability`]; nothing else makes authorization decisions.

use serde::Serialize;

use super::capability::{Capabilities, Capability, CapabilityGrant};
use crate::error::{AppError, Result};
use crate::models::{Course, Principal};
use crate::store::CapabilityStore;

/// Decide a capability check against an already-loaded grant.
///
/// Resolution order (first match wins):
/// 1. Platform admin
/// 2. Course owner
/// 3. No grant: deny
/// 4. Grant with `full_access`
/// 5. The grant's explicit flag
pub fn decide(
    principal: &Principal,
    course: &Course,
    grant: Option<&CapabilityGrant>,
    capability: Capability,
) -> bool {
    if is_privileged(principal, course) {
        return true;
    }
    grant
        .filter(|g| g.course_id == course.id && g.teacher_id == principal.id)
        .is_some_and(|g| g.capabilities.allows(capability))
}

/// Admins and the course owner hold every capability unconditionally.
pub fn is_privileged(principal: &Principal, course: &Course) -> bool {
    principal.is_admin() || principal.id == course.owner_id
}

/// Resolve `capability` for `principal` on `course`, reading the grant only
/// when role and ownership don't already decide it.
pub async fn resolve<S>(
    store: &S,
    principal: &Principal,
    course: &Course,
    capability: Capability,
) -> Result<bool>
where
    S: CapabilityStore + ?Sized,
{
    if is_privileged(principal, course) {
        return Ok(true);
    }
    let grant = store.find_grant(course.id, principal.id).await?;
    Ok(decide(principal, course, grant.as_ref(), capability))
}

/// Like [`resolve`], but a denial becomes `Forbidden`.
#[tracing::instrument(skip(store, course), fields(course_id = %course.id, user_id = %principal.id))]
pub async fn require<S>(
    store: &S,
    principal: &Principal,
    course: &Course,
    capability: Capability,
) -> Result<()>
where
    S: CapabilityStore + ?Sized,
{
    if resolve(store, principal, course, capability).await? {
        Ok(())
    } else {
        tracing::warn!(capability = capability.as_str(), "permission denied");
        Err(AppError::Forbidden(capability.as_str()))
    }
}

/// Caller's standing on a course. Used to decide what to advertise, never
/// to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum EffectiveRole {
    Admin,
    Owner,
    Teacher { capabilities: Capabilities },
    Student,
}

impl EffectiveRole {
    /// Capability set to advertise for this role.
    pub const fn capabilities(&self) -> Capabilities {
        match self {
            Self::Admin | Self::Owner => Capabilities::all(),
            Self::Teacher { capabilities } => *capabilities,
            Self::Student => Capabilities::none(),
        }
    }

    /// Whether this caller may set `full_access` / `manage_teachers` on grants.
    pub const fn can_grant_privileged(&self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }
}

pub fn effective_role_from(
    principal: &Principal,
    course: &Course,
    grant: Option<&CapabilityGrant>,
) -> EffectiveRole {
    if principal.is_admin() {
        return EffectiveRole::Admin;
    }
    if principal.id == course.owner_id {
        return EffectiveRole::Owner;
    }
    match grant {
        Some(g) if g.course_id == course.id && g.teacher_id == principal.id => {
            EffectiveRole::Teacher {
                capabilities: g.capabilities,
            }
        }
        _ => EffectiveRole::Student,
    }
}

pub async fn effective_role<S>(
    store: &S,
    principal: &Principal,
    course: &Course,
) -> Result<EffectiveRole>
where
    S: CapabilityStore + ?Sized,
{
    if is_privileged(principal, course) {
        return Ok(effective_role_from(principal, course, None));
    }
    let grant = store.find_grant(course.id, principal.id).await?;
    Ok(effective_role_from(principal, course, grant.as_ref()))
}

/// Apply a grantor's requested capability set to a grant.
///
/// Only admins and the owner may touch `full_access` and `manage_teachers`.
/// For anyone else those two flags keep their `previous` value; the rest of
/// the request goes through untouched.
pub fn clamp_capabilities(
    grantor_privileged: bool,
    previous: Capabilities,
    requested: Capabilities,
) -> Capabilities {
    if grantor_privileged {
        return requested;
    }
    Capabilities {
        full_access: previous.full_access,
        manage_teachers: previous.manage_teachers,
        ..requested
    }
}
