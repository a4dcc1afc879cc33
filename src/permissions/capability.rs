//! Capability flags and the per-course teacher grant record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A named, grantable course permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ManageContent,
    ManageStudents,
    FullAccess,
    ManageTeachers,
}

impl Capability {
    pub const ALL: [Self; 4] = [
        Self::ManageContent,
        Self::ManageStudents,
        Self::FullAccess,
        Self::ManageTeachers,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManageContent => "manage_content",
            Self::ManageStudents => "manage_students",
            Self::FullAccess => "full_access",
            Self::ManageTeachers => "manage_teachers",
        }
    }
}

/// Capability set held by one teacher on one course.
///
/// Stored as four boolean columns; missing JSON fields default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Capabilities {
    pub manage_content: bool,
    pub manage_students: bool,
    pub full_access: bool,
    pub manage_teachers: bool,
}

impl Capabilities {
    pub const fn all() -> Self {
        Self {
            manage_content: true,
            manage_students: true,
            full_access: true,
            manage_teachers: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            manage_content: false,
            manage_students: false,
            full_access: false,
            manage_teachers: false,
        }
    }

    /// The explicit flag, ignoring `full_access`.
    pub const fn flag(&self, capability: Capability) -> bool {
        match capability {
            Capability::ManageContent => self.manage_content,
            Capability::ManageStudents => self.manage_students,
            Capability::FullAccess => self.full_access,
            Capability::ManageTeachers => self.manage_teachers,
        }
    }

    /// Whether this set authorizes `capability`. `full_access` implies all.
    pub const fn allows(&self, capability: Capability) -> bool {
        self.full_access || self.flag(capability)
    }

    #[cfg(test)]
    pub fn with(mut self, capability: Capability) -> Self {
        match capability {
            Capability::ManageContent => self.manage_content = true,
            Capability::ManageStudents => self.manage_students = true,
            Capability::FullAccess => self.full_access = true,
            Capability::ManageTeachers => self.manage_teachers = true,
        }
        self
    }
}

/// Per-course teacher grant. At most one exists per `(course_id, teacher_id)`
/// and none ever targets the course owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CapabilityGrant {
    pub course_id: Uuid,
    pub teacher_id: Uuid,
    pub granted_by: Uuid,
    #[sqlx(flatten)]
    pub capabilities: Capabilities,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
