//! User entity and the commands that mutate it.
//!
//! Users are never hard-deleted: deactivation flips `is_active` and bumps
//! `token_version` in one store operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::{DomainError, DomainResult, RoleId, UserId};

use crate::password::{self, PasswordError};

pub const MAX_NAME_LEN: usize = 150;

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// Stored user account.
///
/// # Invariants
/// - `email` is unique, trimmed and lower-cased.
/// - `password_hash` is always an Argon2 PHC string, never plaintext.
/// - `token_version` only ever grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub token_version: i64,
    pub role_id: Option<RoleId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn check_password(&self, raw: &str) -> bool {
        password::verify_password(raw, &self.password_hash)
    }

    /// Ownership is the only relationship between a requester and a user
    /// record: the requester *is* the record.
    pub fn is_owned_by(&self, requester: UserId) -> bool {
        self.id == requester
    }

    pub fn profile(&self) -> ProfileView {
        ProfileView {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            middle_name: self.middle_name.clone(),
        }
    }

    pub fn admin_view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            middle_name: self.middle_name.clone(),
            is_active: self.is_active,
            role_id: self.role_id,
        }
    }
}

/// What a user sees of themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileView {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
}

/// What user administration sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub is_active: bool,
    pub role_id: Option<RoleId>,
}

/// Insert payload. Ids, timestamps and `token_version = 0` come from the
/// store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub role_id: Option<RoleId>,
}

impl NewUser {
    /// Enforce the stored-hash invariant before a write.
    pub fn sealed(mut self) -> Result<Self, PasswordError> {
        self.password_hash = password::ensure_hashed(self.password_hash)?;
        Ok(self)
    }
}

impl User {
    /// Enforce the stored-hash invariant before a write.
    pub fn sealed(mut self) -> Result<Self, PasswordError> {
        self.password_hash = password::ensure_hashed(self.password_hash)?;
        Ok(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Self-service registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub email: String,
    pub password: String,
    pub password_repeat: String,
}

/// Credentials presented at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Partial profile edit by the user themselves. Email and id are read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub old_password: String,
    pub new_password: String,
    pub new_password_repeat: String,
}

/// User creation through administration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCreateUser {
    pub email: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub password: String,
    /// Falls back to the default role when absent.
    #[serde(default)]
    pub role_id: Option<RoleId>,
}

/// Partial update through administration.
///
/// `role_id: Some(None)` clears the role.
#[derive(Debug, Clone, Default)]
pub struct AdminUserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub is_active: Option<bool>,
    pub role_id: Option<Option<RoleId>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> DomainResult<()> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::validation("invalid email format"));
    };
    if local.is_empty() || domain.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("invalid email format"));
    }
    Ok(())
}

fn required_name(field: &str, value: &str) -> DomainResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

fn optional_name(field: &str, value: Option<&str>) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required_name(field, v).map(Some),
    }
}

/// Names after trimming; blank optional names become `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Names {
    pub first_name: String,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
}

pub fn validate_names(first: &str, last: Option<&str>, middle: Option<&str>) -> DomainResult<Names> {
    Ok(Names {
        first_name: required_name("first_name", first)?,
        last_name: optional_name("last_name", last)?,
        middle_name: optional_name("middle_name", middle)?,
    })
}

impl RegisterUser {
    /// Everything except email uniqueness, which needs the store.
    pub fn validate(&self) -> DomainResult<(String, Names)> {
        let email = normalize_email(&self.email);
        validate_email(&email)?;
        let names = validate_names(
            &self.first_name,
            self.last_name.as_deref(),
            self.middle_name.as_deref(),
        )?;
        password::check_password_policy(&self.password)?;
        if self.password != self.password_repeat {
            return Err(DomainError::validation("passwords do not match"));
        }
        Ok((email, names))
    }
}

impl AdminCreateUser {
    pub fn validate(&self) -> DomainResult<(String, Names)> {
        let email = normalize_email(&self.email);
        validate_email(&email)?;
        let names = validate_names(
            &self.first_name,
            self.last_name.as_deref(),
            self.middle_name.as_deref(),
        )?;
        if self.password.chars().count() < password::MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {} characters long",
                password::MIN_PASSWORD_LEN
            )));
        }
        Ok((email, names))
    }
}

impl ChangePassword {
    /// Checks that need the current user (old password) are done by the
    /// caller; this covers the new-password rules.
    pub fn validate_new(&self) -> DomainResult<()> {
        if self.new_password != self.new_password_repeat {
            return Err(DomainError::validation("new passwords do not match"));
        }
        password::check_password_policy(&self.new_password)
    }
}

impl ProfileUpdate {
    pub fn apply(&self, user: &User) -> DomainResult<User> {
        let mut next = user.clone();
        if let Some(first) = &self.first_name {
            next.first_name = required_name("first_name", first)?;
        }
        if let Some(last) = &self.last_name {
            next.last_name = optional_name("last_name", Some(last))?;
        }
        if let Some(middle) = &self.middle_name {
            next.middle_name = optional_name("middle_name", Some(middle))?;
        }
        Ok(next)
    }
}

impl AdminUserUpdate {
    /// Apply field edits. The active flag is not among them: the store only
    /// changes it through `deactivate` and `reactivate`.
    pub fn apply(&self, user: &User) -> DomainResult<User> {
        let profile = ProfileUpdate {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            middle_name: self.middle_name.clone(),
        };
        let mut next = profile.apply(user)?;
        if let Some(role_id) = self.role_id {
            next.role_id = role_id;
        }
        Ok(next)
    }

    pub fn deactivates(&self, user: &User) -> bool {
        user.is_active && self.is_active == Some(false)
    }

    pub fn reactivates(&self, user: &User) -> bool {
        !user.is_active && self.is_active == Some(true)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
