//! Course permission system.
//!
//! Three sources of authority, checked in order:
//! - Platform admins: every capability on every course
//! - Course owner: every capability on their course, never stored as a grant
//! - Teachers: per-course capability grants

pub mod capability;
pub mod resolver;

pub use capability::{Capabilities, Capability, CapabilityGrant};
pub use resolver::{
    clamp_capabilities, decide, effective_role, effective_role_from, is_privileged, require,
    resolve, EffectiveRole,
};
