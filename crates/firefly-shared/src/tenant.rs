//! # Tenant Identity
//!
//! A tenant is a UUID identifying an isolation scope. The all-zeros UUID
//! denotes the *global tenant*, used for cross-tenant enrichers and as the
//! fallback scope when a tenant-specific lookup comes up empty.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Newtype around a tenant UUID so "is this the global tenant" comparisons
/// can't be confused with an arbitrary caller-supplied UUID that merely
/// looks like zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// The global tenant: cross-tenant enrichers register here, and
    /// tenant-scoped lookups fall back here when they come up empty.
    pub const GLOBAL: TenantId = TenantId(Uuid::nil());

    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    pub const fn is_global(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::GLOBAL
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
