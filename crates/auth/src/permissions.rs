use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::{DomainError, ElementId, RoleId, RuleId};

/// Operation requested against a business element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(DomainError::validation(format!(
                "unknown action '{other}' (expected create, read, update or delete)"
            ))),
        }
    }
}

/// The pair of flags consulted for a scoped action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityPair {
    /// Granted on records the requester owns.
    pub own: bool,
    /// Granted on every record.
    pub all: bool,
}

/// Seven-flag capability matrix of one (role, element) rule.
///
/// The all-false value is what a missing rule means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub read_all: bool,
    #[serde(default)]
    pub update: bool,
    #[serde(default)]
    pub update_all: bool,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub delete_all: bool,
}

impl Capabilities {
    pub const NONE: Capabilities = Capabilities {
        create: false,
        read: false,
        read_all: false,
        update: false,
        update_all: false,
        delete: false,
        delete_all: false,
    };

    pub const FULL: Capabilities = Capabilities {
        create: true,
        read: true,
        read_all: true,
        update: true,
        update_all: true,
        delete: true,
        delete_all: true,
    };

    /// Own/all flags for a scoped action. `create` has no scope and returns
    /// `None`.
    pub fn scoped(&self, action: Action) -> Option<CapabilityPair> {
        match action {
            Action::Create => None,
            Action::Read => Some(CapabilityPair {
                own: self.read,
                all: self.read_all,
            }),
            Action::Update => Some(CapabilityPair {
                own: self.update,
                all: self.update_all,
            }),
            Action::Delete => Some(CapabilityPair {
                own: self.delete,
                all: self.delete_all,
            }),
        }
    }
}

/// Stored rule: one per (role, element) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRoleRule {
    pub id: RuleId,
    pub role_id: RoleId,
    pub element_id: ElementId,
    #[serde(flatten)]
    pub capabilities: Capabilities,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for inserting a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    pub role_id: RoleId,
    pub element_id: ElementId,
    #[serde(flatten)]
    pub capabilities: Capabilities,
}

/// Partial update of a rule. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulePatch {
    pub role_id: Option<RoleId>,
    pub element_id: Option<ElementId>,
    pub create: Option<bool>,
    pub read: Option<bool>,
    pub read_all: Option<bool>,
    pub update: Option<bool>,
    pub update_all: Option<bool>,
    pub delete: Option<bool>,
    pub delete_all: Option<bool>,
}

impl RulePatch {
    /// Apply onto a copy of `rule`, leaving timestamps to the store.
    pub fn apply(&self, rule: &AccessRoleRule) -> AccessRoleRule {
        let mut next = rule.clone();
        if let Some(role_id) = self.role_id {
            next.role_id = role_id;
        }
        if let Some(element_id) = self.element_id {
            next.element_id = element_id;
        }

        let caps = &mut next.capabilities;
        let flags = [
            (&mut caps.create, self.create),
            (&mut caps.read, self.read),
            (&mut caps.read_all, self.read_all),
            (&mut caps.update, self.update),
            (&mut caps.update_all, self.update_all),
            (&mut caps.delete, self.delete),
            (&mut caps.delete_all, self.delete_all),
        ];
        for (slot, value) in flags {
            if let Some(value) = value {
                *slot = value;
            }
        }
        next
    }
}
