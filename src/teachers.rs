//! Course staff management: teacher grants and the caller's own standing.

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Course, GrantTeacherReq, Principal, UpdateTeacherReq};
use crate::permissions::{
    self, clamp_capabilities, Capabilities, Capability, CapabilityGrant, EffectiveRole,
};
use crate::quizzes::load_course;
use crate::store::Store;

#[derive(Debug, Clone, Serialize)]
pub struct MyPermissions {
    pub course_id: Uuid,
    #[serde(flatten)]
    pub role: EffectiveRole,
    pub effective: Capabilities,
    pub can_grant_privileged: bool,
}

fn reject_owner(course: &Course, teacher_id: Uuid) -> Result<()> {
    if teacher_id == course.owner_id {
        return Err(AppError::InvalidTarget(
            "the course owner cannot be granted, edited or removed as a teacher",
        ));
    }
    Ok(())
}

#[tracing::instrument(skip(store))]
pub async fn my_permissions(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
) -> Result<MyPermissions> {
    let course = load_course(store, course_id).await?;
    let role = permissions::effective_role(store, principal, &course).await?;
    let mut effective = role.capabilities();
    if effective.full_access {
        effective = Capabilities::all();
    }
    Ok(MyPermissions {
        course_id,
        role,
        effective,
        can_grant_privileged: role.can_grant_privileged(),
    })
}

/// Visible to admins, the owner and anyone holding a grant on the course.
#[tracing::instrument(skip(store))]
pub async fn list_teachers(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
) -> Result<Vec<CapabilityGrant>> {
    let course = load_course(store, course_id).await?;
    let role = permissions::effective_role(store, principal, &course).await?;
    if role == EffectiveRole::Student {
        return Err(AppError::Forbidden("course staff"));
    }
    store.list_grants(course_id).await
}

#[tracing::instrument(skip(store, req), fields(teacher_id = %req.teacher_id))]
pub async fn add_teacher(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    req: GrantTeacherReq,
) -> Result<CapabilityGrant> {
    let course = load_course(store, course_id).await?;
    permissions::require(store, principal, &course, Capability::ManageTeachers).await?;
    reject_owner(&course, req.teacher_id)?;

    let privileged = permissions::is_privileged(principal, &course);
    let capabilities = clamp_capabilities(privileged, Capabilities::none(), req.capabilities);
    if capabilities != req.capabilities {
        tracing::warn!("privileged flags dropped from new grant");
    }

    let grant = store
        .insert_grant(course_id, req.teacher_id, principal.id, capabilities)
        .await?;
    tracing::info!(?capabilities, "teacher added");
    Ok(grant)
}

#[tracing::instrument(skip(store, req))]
pub async fn update_teacher(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    teacher_id: Uuid,
    req: UpdateTeacherReq,
) -> Result<CapabilityGrant> {
    let course = load_course(store, course_id).await?;
    permissions::require(store, principal, &course, Capability::ManageTeachers).await?;
    reject_owner(&course, teacher_id)?;

    let existing = store
        .find_grant(course_id, teacher_id)
        .await?
        .ok_or(AppError::NotFound("teacher grant"))?;
    let privileged = permissions::is_privileged(principal, &course);
    let capabilities = clamp_capabilities(privileged, existing.capabilities, req.capabilities);
    if capabilities != req.capabilities {
        tracing::warn!("privileged flags kept at their previous value");
    }

    let grant = store
        .update_grant(course_id, teacher_id, capabilities)
        .await?
        .ok_or(AppError::NotFound("teacher grant"))?;
    tracing::info!(?capabilities, "teacher updated");
    Ok(grant)
}

#[tracing::instrument(skip(store))]
pub async fn remove_teacher(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    teacher_id: Uuid,
) -> Result<()> {
    let course = load_course(store, course_id).await?;
    permissions::require(store, principal, &course, Capability::ManageTeachers).await?;
    reject_owner(&course, teacher_id)?;

    if !store.delete_grant(course_id, teacher_id).await? {
        return Err(AppError::NotFound("teacher grant"));
    }
    tracing::info!("teacher removed");
    Ok(())
}

/// Self-revoke. Needs no capability, only a grant to give up.
#[tracing::instrument(skip(store))]
pub async fn leave_course(store: &dyn Store, principal: &Principal, course_id: Uuid) -> Result<()> {
    let course = load_course(store, course_id).await?;
    if principal.id == course.owner_id {
        return Err(AppError::InvalidTarget("the course owner cannot leave the course"));
    }
    if !store.delete_grant(course_id, principal.id).await? {
        return Err(AppError::NotFound("teacher grant"));
    }
    tracing::info!("teacher left course");
    Ok(())
}
