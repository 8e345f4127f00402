//! Request authorization flow.
//!
//! `AuthorizationService` takes its identity provider and rule repository as
//! explicit dependencies and exposes the two checks every endpoint uses:
//! [`AuthorizationService::check_read_scope`] for collections and
//! [`AuthorizationService::check_action_permission`] for everything else.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use rolegate_core::{DomainError, RoleId};

use crate::authorize::{self, AuthorizationExplanation, ReadScope};
use crate::password::PasswordError;
use crate::permissions::{Action, Capabilities};
use crate::principal::Principal;
use crate::store::{RuleRepository, StoreError, UserRepository};
use crate::token::{TokenError, TokenService, TokenState};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Boundary error taxonomy shared by every service operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No valid identity could be resolved.
    #[error("authentication required")]
    Unauthenticated,

    /// Identity resolved, capability denied.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    /// Malformed input to a mutation (duplicate rule, weak password, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Conflict(msg) | StoreError::Invalid(msg) => AuthError::Validation(msg),
            StoreError::Backend(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<DomainError> for AuthError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) | DomainError::Conflict(msg) => {
                AuthError::Validation(msg)
            }
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(value: PasswordError) -> Self {
        AuthError::Internal(value.to_string())
    }
}

impl From<TokenError> for AuthError {
    fn from(value: TokenError) -> Self {
        AuthError::Internal(value.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity resolution
// ─────────────────────────────────────────────────────────────────────────────

/// Why a presented token did not yield a principal.
///
/// Logged only. Callers see every variant as "anonymous".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    Expired,
    UnknownUser,
    Inactive,
    VersionStale { token: i64, current: i64 },
    Lookup(String),
}

/// Resolves a bearer token into a principal.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, token: &str) -> Result<Principal, TokenRejection>;
}

#[async_trait::async_trait]
impl<P> IdentityProvider for Arc<P>
where
    P: IdentityProvider + ?Sized,
{
    async fn identify(&self, token: &str) -> Result<Principal, TokenRejection> {
        (**self).identify(token).await
    }
}

/// Token-backed identity provider: signature, expiry, then a stored-user
/// check (exists, active, version match).
pub struct TokenAuthenticator<U> {
    tokens: Arc<TokenService>,
    users: U,
}

impl<U> TokenAuthenticator<U>
where
    U: UserRepository,
{
    pub fn new(tokens: Arc<TokenService>, users: U) -> Self {
        Self { tokens, users }
    }

    pub async fn identify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, TokenRejection> {
        let claims = match self.tokens.decode(token, now) {
            TokenState::Malformed => return Err(TokenRejection::Malformed),
            TokenState::Expired => return Err(TokenRejection::Expired),
            TokenState::Decoded(claims) => claims,
        };

        let user = match self.users.get(claims.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(TokenRejection::UnknownUser),
            Err(e) => return Err(TokenRejection::Lookup(e.to_string())),
        };

        if !user.is_active {
            return Err(TokenRejection::Inactive);
        }
        if user.token_version != claims.v {
            return Err(TokenRejection::VersionStale {
                token: claims.v,
                current: user.token_version,
            });
        }

        Ok(Principal::new(user))
    }
}

#[async_trait::async_trait]
impl<U> IdentityProvider for TokenAuthenticator<U>
where
    U: UserRepository,
{
    async fn identify(&self, token: &str) -> Result<Principal, TokenRejection> {
        self.identify_at(token, Utc::now()).await
    }
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme is matched case-insensitively and stray quotes around the token
/// are dropped. Anything else yields `None`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let (scheme, token) = header?.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim().trim_matches(|c| c == '"' || c == '\'');
    (!token.is_empty()).then_some(token)
}

/// Unauthenticated unless a principal was resolved.
pub fn require_principal(principal: Option<&Principal>) -> Result<&Principal, AuthError> {
    principal.ok_or(AuthError::Unauthenticated)
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization service
// ─────────────────────────────────────────────────────────────────────────────

pub struct AuthorizationService<I, R> {
    identities: I,
    rules: R,
}

impl<I, R> AuthorizationService<I, R>
where
    I: IdentityProvider,
    R: RuleRepository,
{
    pub fn new(identities: I, rules: R) -> Self {
        Self { identities, rules }
    }

    /// Resolve the caller from an `Authorization` header value. Every
    /// failure is anonymous.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Option<Principal> {
        let token = bearer_token(authorization)?;
        match self.identities.identify(token).await {
            Ok(principal) => Some(principal),
            Err(TokenRejection::Lookup(e)) => {
                warn!(error = %e, "user lookup failed during token validation");
                None
            }
            Err(rejection) => {
                debug!(?rejection, "token rejected; treating request as anonymous");
                None
            }
        }
    }

    async fn capabilities(&self, role: Option<RoleId>, element: &str) -> Result<Option<Capabilities>, AuthError> {
        let Some(role) = role else {
            return Ok(None);
        };
        let rule = self.rules.find_rule(role, element).await?;
        Ok(rule.map(|r| r.capabilities))
    }

    /// `decide(role, element, action, is_owner)` against the current rule table.
    pub async fn decide(
        &self,
        role: Option<RoleId>,
        element: &str,
        action: Action,
        is_owner: bool,
    ) -> Result<bool, AuthError> {
        let caps = self.capabilities(role, element).await?;
        Ok(authorize::decide(caps.as_ref(), action, is_owner))
    }

    pub async fn scope(&self, role: Option<RoleId>, element: &str, action: Action) -> Result<Option<ReadScope>, AuthError> {
        let caps = self.capabilities(role, element).await?;
        Ok(authorize::scope(caps.as_ref(), action))
    }

    /// Collection read check: `All` or `OwnOnly` for the caller to filter by.
    pub async fn check_read_scope(&self, principal: Option<&Principal>, element: &str) -> Result<ReadScope, AuthError> {
        let principal = require_principal(principal)?;
        match self.scope(principal.role_id(), element, Action::Read).await? {
            Some(scope) => Ok(scope),
            None => {
                debug!(user_id = %principal.user_id(), element, "read scope denied");
                Err(AuthError::forbidden(format!("cannot read '{element}'")))
            }
        }
    }

    /// Single-action check. `is_owner` is computed by the caller (false for
    /// collection-level actions such as create).
    pub async fn check_action_permission(
        &self,
        principal: Option<&Principal>,
        element: &str,
        action: Action,
        is_owner: bool,
    ) -> Result<(), AuthError> {
        let principal = require_principal(principal)?;
        if self.decide(principal.role_id(), element, action, is_owner).await? {
            Ok(())
        } else {
            debug!(user_id = %principal.user_id(), element, %action, is_owner, "action denied");
            Err(AuthError::forbidden(format!("cannot {action} '{element}'")))
        }
    }

    /// Audit view of the decision the caller would get.
    pub async fn explain(
        &self,
        principal: &Principal,
        element: &str,
        action: Action,
        is_owner: bool,
    ) -> Result<AuthorizationExplanation, AuthError> {
        let role = match principal.role_id() {
            Some(id) => self.rules.get_role(id).await?,
            None => None,
        };
        let caps = self.capabilities(principal.role_id(), element).await?;
        Ok(authorize::explain(
            role.as_ref().map(|r| r.name.as_str()),
            element,
            caps.as_ref(),
            action,
            is_owner,
        ))
    }
}
