//! Storage contracts for users and the rule table.
//!
//! Implementations live in `rolegate-infra` (in-memory and Postgres).

use std::sync::Arc;

use thiserror::Error;

use rolegate_core::{ElementId, RoleId, RuleId, UserId};

use crate::permissions::{AccessRoleRule, NewRule};
use crate::roles::{BusinessElement, Role};
use crate::user::{NewUser, User};

/// Repository operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint was hit (email, role name, (role, element)).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record cannot be stored as given (dangling reference, bad hash).
    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// User persistence.
///
/// `token_version` is only ever changed by [`UserRepository::bump_token_version`]
/// and [`UserRepository::deactivate`], both atomic per user.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Lookup by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// All users ordered by id.
    async fn list(&self) -> Result<Vec<User>, StoreError>;

    /// Insert with `token_version = 0`. Duplicate email is a `Conflict`.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Persist names, email, password hash and role. Leaves `is_active` and
    /// `token_version` untouched, so a stale copy cannot undo a deactivation.
    async fn update(&self, user: &User) -> Result<User, StoreError>;

    /// Atomically increment `token_version`, returning the new value.
    async fn bump_token_version(&self, id: UserId) -> Result<i64, StoreError>;

    /// Atomically set `is_active = false` and increment `token_version`.
    async fn deactivate(&self, id: UserId) -> Result<User, StoreError>;

    /// Set `is_active = true`. Outstanding tokens stay revoked.
    async fn reactivate(&self, id: UserId) -> Result<User, StoreError>;
}

/// Roles, business elements and access rules.
#[async_trait::async_trait]
pub trait RuleRepository: Send + Sync {
    /// The unique rule for (role, element name), if any.
    async fn find_rule(&self, role_id: RoleId, element: &str) -> Result<Option<AccessRoleRule>, StoreError>;

    async fn list_rules(&self) -> Result<Vec<AccessRoleRule>, StoreError>;
    async fn get_rule(&self, id: RuleId) -> Result<Option<AccessRoleRule>, StoreError>;

    /// Duplicate (role, element) is a `Conflict`; unknown role or element is
    /// `Invalid`.
    async fn insert_rule(&self, rule: NewRule) -> Result<AccessRoleRule, StoreError>;

    /// Same constraints as insert; a missing rule is `NotFound`.
    async fn update_rule(&self, rule: &AccessRoleRule) -> Result<AccessRoleRule, StoreError>;

    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError>;

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, StoreError>;
    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError>;
    async fn insert_role(&self, name: &str, description: &str) -> Result<Role, StoreError>;

    async fn list_elements(&self) -> Result<Vec<BusinessElement>, StoreError>;
    async fn get_element(&self, id: ElementId) -> Result<Option<BusinessElement>, StoreError>;
    async fn find_element(&self, name: &str) -> Result<Option<BusinessElement>, StoreError>;
    async fn insert_element(&self, name: &str, description: &str) -> Result<BusinessElement, StoreError>;
}

#[async_trait::async_trait]
impl<S> UserRepository for Arc<S>
where
    S: UserRepository + ?Sized,
{
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).get(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        (**self).list().await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        (**self).insert(user).await
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        (**self).update(user).await
    }

    async fn bump_token_version(&self, id: UserId) -> Result<i64, StoreError> {
        (**self).bump_token_version(id).await
    }

    async fn deactivate(&self, id: UserId) -> Result<User, StoreError> {
        (**self).deactivate(id).await
    }

    async fn reactivate(&self, id: UserId) -> Result<User, StoreError> {
        (**self).reactivate(id).await
    }
}

#[async_trait::async_trait]
impl<S> RuleRepository for Arc<S>
where
    S: RuleRepository + ?Sized,
{
    async fn find_rule(&self, role_id: RoleId, element: &str) -> Result<Option<AccessRoleRule>, StoreError> {
        (**self).find_rule(role_id, element).await
    }

    async fn list_rules(&self) -> Result<Vec<AccessRoleRule>, StoreError> {
        (**self).list_rules().await
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<AccessRoleRule>, StoreError> {
        (**self).get_rule(id).await
    }

    async fn insert_rule(&self, rule: NewRule) -> Result<AccessRoleRule, StoreError> {
        (**self).insert_rule(rule).await
    }

    async fn update_rule(&self, rule: &AccessRoleRule) -> Result<AccessRoleRule, StoreError> {
        (**self).update_rule(rule).await
    }

    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        (**self).delete_rule(id).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        (**self).list_roles().await
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        (**self).get_role(id).await
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        (**self).find_role(name).await
    }

    async fn insert_role(&self, name: &str, description: &str) -> Result<Role, StoreError> {
        (**self).insert_role(name, description).await
    }

    async fn list_elements(&self) -> Result<Vec<BusinessElement>, StoreError> {
        (**self).list_elements().await
    }

    async fn get_element(&self, id: ElementId) -> Result<Option<BusinessElement>, StoreError> {
        (**self).get_element(id).await
    }

    async fn find_element(&self, name: &str) -> Result<Option<BusinessElement>, StoreError> {
        (**self).find_element(name).await
    }

    async fn insert_element(&self, name: &str, description: &str) -> Result<BusinessElement, StoreError> {
        (**self).insert_element(name, description).await
    }
}
