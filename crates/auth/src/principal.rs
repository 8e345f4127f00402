use rolegate_core::{RoleId, UserId};

use crate::user::User;

/// A fully resolved principal for authorization decisions.
///
/// Only built from a token whose signature, expiry and version all checked
/// out against an active stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    user: User,
}

impl Principal {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> UserId {
        self.user.id
    }

    pub fn role_id(&self) -> Option<RoleId> {
        self.user.role_id
    }

    pub fn token_version(&self) -> i64 {
        self.user.token_version
    }

    pub fn user(&self) -> &User {
        &self.user
    }
}
