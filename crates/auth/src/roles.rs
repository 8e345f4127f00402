use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::{ElementId, RoleId};

/// Role assigned to new registrations and to admin-created users without an
/// explicit role.
pub const DEFAULT_ROLE: &str = "user";
pub const DEFAULT_ROLE_DESCRIPTION: &str = "Regular user";

/// Business element guarding user records.
pub const USERS_ELEMENT: &str = "users";

/// Business element guarding the rule table itself (roles, elements, rules).
pub const ACCESS_RULES_ELEMENT: &str = "access_rules";

/// A named role. Users reference at most one role; rules are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A protected resource kind, e.g. `"users"` or `"orders"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessElement {
    pub id: ElementId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl core::fmt::Display for BusinessElement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.name)
    }
}
