//! Self-service account operations.
//!
//! Every operation that should end existing sessions (login, logout,
//! password change, deactivation) does so by bumping `token_version`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use rolegate_core::{DomainError, RoleId};

use crate::password;
use crate::principal::Principal;
use crate::roles::{DEFAULT_ROLE, DEFAULT_ROLE_DESCRIPTION};
use crate::service::AuthError;
use crate::store::{RuleRepository, StoreError, UserRepository};
use crate::token::{IssuedToken, TokenService};
use crate::user::{ChangePassword, Credentials, NewUser, ProfileUpdate, RegisterUser, User};

const BAD_CREDENTIALS: &str = "invalid email or password";

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    /// The user as stored after the version bump.
    pub user: User,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    rules: Arc<dyn RuleRepository>,
    tokens: Arc<TokenService>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, rules: Arc<dyn RuleRepository>, tokens: Arc<TokenService>) -> Self {
        Self { users, rules, tokens }
    }

    /// Id of the default role, created on first use.
    pub async fn default_role(&self) -> Result<RoleId, AuthError> {
        default_role(self.rules.as_ref()).await
    }

    #[instrument(skip(self, cmd), fields(email = %cmd.email.trim()), err)]
    pub async fn register(&self, cmd: RegisterUser) -> Result<User, AuthError> {
        let (email, names) = cmd.validate()?;
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict("a user with this email already exists").into());
        }

        let role_id = self.default_role().await?;
        let user = self
            .users
            .insert(NewUser {
                first_name: names.first_name,
                last_name: names.last_name,
                middle_name: names.middle_name,
                email,
                password_hash: password::hash_password(&cmd.password)?,
                is_active: true,
                role_id: Some(role_id),
            })
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn login(&self, credentials: Credentials) -> Result<LoginOutcome, AuthError> {
        self.login_at(credentials, Utc::now()).await
    }

    /// Verify credentials, bump the version, then mint a token carrying the
    /// new version. Unknown, inactive and wrong-password all fail alike.
    #[instrument(skip(self, credentials), err)]
    pub async fn login_at(&self, credentials: Credentials, now: DateTime<Utc>) -> Result<LoginOutcome, AuthError> {
        let email = crate::user::normalize_email(&credentials.email);
        let Some(mut user) = self.users.find_by_email(&email).await? else {
            return Err(AuthError::validation(BAD_CREDENTIALS));
        };
        if !user.is_active || !user.check_password(&credentials.password) {
            return Err(AuthError::validation(BAD_CREDENTIALS));
        }

        user.token_version = self.users.bump_token_version(user.id).await?;
        let token = self.tokens.issue(user.id, user.token_version, now)?;

        info!(user_id = %user.id, token_version = user.token_version, "login succeeded");
        Ok(LoginOutcome { token, user })
    }

    #[instrument(skip(self, principal, update), fields(user_id = %principal.user_id()), err)]
    pub async fn update_profile(&self, principal: &Principal, update: ProfileUpdate) -> Result<User, AuthError> {
        let current = self.current(principal).await?;
        let next = update.apply(&current)?;
        Ok(self.users.update(&next).await?)
    }

    /// Store the new hash, then revoke every outstanding token.
    #[instrument(skip(self, principal, cmd), fields(user_id = %principal.user_id()), err)]
    pub async fn change_password(&self, principal: &Principal, cmd: ChangePassword) -> Result<(), AuthError> {
        let mut user = self.current(principal).await?;
        if !user.check_password(&cmd.old_password) {
            return Err(AuthError::validation("old password is incorrect"));
        }
        cmd.validate_new()?;

        user.password_hash = password::hash_password(&cmd.new_password)?;
        self.users.update(&user).await?;
        self.users.bump_token_version(user.id).await?;

        info!("password changed; tokens revoked");
        Ok(())
    }

    /// Revoke every outstanding token of the caller. Returns the new version.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id()), err)]
    pub async fn logout(&self, principal: &Principal) -> Result<i64, AuthError> {
        let version = self.users.bump_token_version(principal.user_id()).await?;
        info!(token_version = version, "logged out; tokens revoked");
        Ok(version)
    }

    /// Soft-delete the caller.
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id()), err)]
    pub async fn deactivate_self(&self, principal: &Principal) -> Result<User, AuthError> {
        let user = self.users.deactivate(principal.user_id()).await?;
        info!("account deactivated");
        Ok(user)
    }

    /// Fresh copy of the caller's row.
    async fn current(&self, principal: &Principal) -> Result<User, AuthError> {
        self.users
            .get(principal.user_id())
            .await?
            .ok_or(AuthError::NotFound)
    }
}

/// Look up the default role, creating it when missing. A concurrent creator
/// winning the race is fine: the loser re-reads.
pub async fn default_role(rules: &dyn RuleRepository) -> Result<RoleId, AuthError> {
    if let Some(role) = rules.find_role(DEFAULT_ROLE).await? {
        return Ok(role.id);
    }
    match rules.insert_role(DEFAULT_ROLE, DEFAULT_ROLE_DESCRIPTION).await {
        Ok(role) => Ok(role.id),
        Err(StoreError::Conflict(_)) => rules
            .find_role(DEFAULT_ROLE)
            .await?
            .map(|r| r.id)
            .ok_or(AuthError::NotFound),
        Err(e) => Err(e.into()),
    }
}
