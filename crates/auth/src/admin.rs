//! User administration and rule-table administration.
//!
//! Both go through the evaluator: user administration is gated by the
//! `users` element, rule administration by the `access_rules` element.

use std::sync::Arc;

use tracing::{info, instrument};

use rolegate_core::{DomainError, ElementId, RoleId, RuleId, UserId};

use crate::accounts::default_role;
use crate::authorize::ReadScope;
use crate::password;
use crate::permissions::{AccessRoleRule, Action, NewRule, RulePatch};
use crate::principal::Principal;
use crate::roles::{BusinessElement, Role, ACCESS_RULES_ELEMENT, USERS_ELEMENT};
use crate::service::{require_principal, AuthError, AuthorizationService, IdentityProvider};
use crate::store::{RuleRepository, UserRepository};
use crate::user::{AdminCreateUser, AdminUserUpdate, NewUser, User};

/// Authorization service over shared trait objects, as wired by the API.
pub type SharedAuthorization = AuthorizationService<Arc<dyn IdentityProvider>, Arc<dyn RuleRepository>>;

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

pub struct UserAdmin {
    authz: Arc<SharedAuthorization>,
    users: Arc<dyn UserRepository>,
    rules: Arc<dyn RuleRepository>,
}

impl UserAdmin {
    pub fn new(
        authz: Arc<SharedAuthorization>,
        users: Arc<dyn UserRepository>,
        rules: Arc<dyn RuleRepository>,
    ) -> Self {
        Self { authz, users, rules }
    }

    /// Users visible to the caller: everyone under `read_all`, only
    /// themselves under plain `read`.
    pub async fn list(&self, principal: Option<&Principal>) -> Result<Vec<User>, AuthError> {
        match self.authz.check_read_scope(principal, USERS_ELEMENT).await? {
            ReadScope::All => Ok(self.users.list().await?),
            ReadScope::OwnOnly => {
                let principal = require_principal(principal)?;
                Ok(self.users.get(principal.user_id()).await?.into_iter().collect())
            }
        }
    }

    #[instrument(skip(self, principal, cmd), fields(email = %cmd.email.trim()), err)]
    pub async fn create(&self, principal: Option<&Principal>, cmd: AdminCreateUser) -> Result<User, AuthError> {
        self.authz
            .check_action_permission(principal, USERS_ELEMENT, Action::Create, false)
            .await?;

        let (email, names) = cmd.validate()?;
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(DomainError::conflict("a user with this email already exists").into());
        }
        let role_id = match cmd.role_id {
            Some(id) => self.known_role(id).await?,
            None => default_role(self.rules.as_ref()).await?,
        };

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

        info!(user_id = %user.id, role_id = %role_id, "user created by administrator");
        Ok(user)
    }

    pub async fn get(&self, principal: Option<&Principal>, id: UserId) -> Result<User, AuthError> {
        let (caller, target) = self.load(principal, id).await?;
        self.authz
            .check_action_permission(Some(caller), USERS_ELEMENT, Action::Read, target.is_owned_by(caller.user_id()))
            .await?;
        Ok(target)
    }

    /// Partial update. Switching an active user off goes through the store's
    /// atomic deactivation so their tokens die with it.
    #[instrument(skip(self, principal, update), fields(target = %id), err)]
    pub async fn update(
        &self,
        principal: Option<&Principal>,
        id: UserId,
        update: AdminUserUpdate,
    ) -> Result<User, AuthError> {
        let (caller, target) = self.load(principal, id).await?;
        self.authz
            .check_action_permission(Some(caller), USERS_ELEMENT, Action::Update, target.is_owned_by(caller.user_id()))
            .await?;

        if let Some(Some(role_id)) = update.role_id {
            self.known_role(role_id).await?;
        }

        let next = update.apply(&target)?;
        let mut saved = self.users.update(&next).await?;
        if update.deactivates(&target) {
            saved = self.users.deactivate(id).await?;
            info!("user deactivated by administrator");
        } else if update.reactivates(&target) {
            saved = self.users.reactivate(id).await?;
            info!("user reactivated by administrator");
        }
        Ok(saved)
    }

    /// Soft delete: the user is deactivated, never removed.
    #[instrument(skip(self, principal), fields(target = %id), err)]
    pub async fn delete(&self, principal: Option<&Principal>, id: UserId) -> Result<(), AuthError> {
        let (caller, target) = self.load(principal, id).await?;
        self.authz
            .check_action_permission(Some(caller), USERS_ELEMENT, Action::Delete, target.is_owned_by(caller.user_id()))
            .await?;

        self.users.deactivate(id).await?;
        info!("user deactivated by administrator");
        Ok(())
    }

    /// Identity first (401), then the target (404); permission is the
    /// caller's job (403).
    async fn load<'p>(&self, principal: Option<&'p Principal>, id: UserId) -> Result<(&'p Principal, User), AuthError> {
        let caller = require_principal(principal)?;
        let target = self.users.get(id).await?.ok_or(AuthError::NotFound)?;
        Ok((caller, target))
    }

    async fn known_role(&self, id: RoleId) -> Result<RoleId, AuthError> {
        match self.rules.get_role(id).await? {
            Some(role) => Ok(role.id),
            None => Err(AuthError::validation(format!("role {id} does not exist"))),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule table
// ─────────────────────────────────────────────────────────────────────────────

pub struct RuleAdmin {
    authz: Arc<SharedAuthorization>,
    rules: Arc<dyn RuleRepository>,
}

impl RuleAdmin {
    pub fn new(authz: Arc<SharedAuthorization>, rules: Arc<dyn RuleRepository>) -> Self {
        Self { authz, rules }
    }

    async fn guard(&self, principal: Option<&Principal>, action: Action) -> Result<(), AuthError> {
        self.authz
            .check_action_permission(principal, ACCESS_RULES_ELEMENT, action, false)
            .await
    }

    pub async fn roles(&self, principal: Option<&Principal>) -> Result<Vec<Role>, AuthError> {
        self.guard(principal, Action::Read).await?;
        Ok(self.rules.list_roles().await?)
    }

    pub async fn elements(&self, principal: Option<&Principal>) -> Result<Vec<BusinessElement>, AuthError> {
        self.guard(principal, Action::Read).await?;
        Ok(self.rules.list_elements().await?)
    }

    pub async fn rules(&self, principal: Option<&Principal>) -> Result<Vec<AccessRoleRule>, AuthError> {
        self.guard(principal, Action::Read).await?;
        Ok(self.rules.list_rules().await?)
    }

    pub async fn rule(&self, principal: Option<&Principal>, id: RuleId) -> Result<AccessRoleRule, AuthError> {
        self.guard(principal, Action::Read).await?;
        self.rules.get_rule(id).await?.ok_or(AuthError::NotFound)
    }

    #[instrument(skip(self, principal), err)]
    pub async fn create_rule(&self, principal: Option<&Principal>, rule: NewRule) -> Result<AccessRoleRule, AuthError> {
        self.guard(principal, Action::Create).await?;
        self.check_slot(rule.role_id, rule.element_id, None).await?;

        let created = self.rules.insert_rule(rule).await?;
        info!(rule_id = %created.id, "access rule created");
        Ok(created)
    }

    #[instrument(skip(self, principal), err)]
    pub async fn update_rule(
        &self,
        principal: Option<&Principal>,
        id: RuleId,
        patch: RulePatch,
    ) -> Result<AccessRoleRule, AuthError> {
        self.guard(principal, Action::Update).await?;
        let current = self.rules.get_rule(id).await?.ok_or(AuthError::NotFound)?;
        let next = patch.apply(&current);
        self.check_slot(next.role_id, next.element_id, Some(id)).await?;

        let saved = self.rules.update_rule(&next).await?;
        info!(rule_id = %saved.id, "access rule updated");
        Ok(saved)
    }

    #[instrument(skip(self, principal), err)]
    pub async fn delete_rule(&self, principal: Option<&Principal>, id: RuleId) -> Result<(), AuthError> {
        self.guard(principal, Action::Delete).await?;
        self.rules.delete_rule(id).await?;
        info!(rule_id = %id, "access rule deleted");
        Ok(())
    }

    /// The role and element must exist and the pair must not already carry
    /// another rule.
    async fn check_slot(
        &self,
        role_id: RoleId,
        element_id: ElementId,
        current: Option<RuleId>,
    ) -> Result<(), AuthError> {
        if self.rules.get_role(role_id).await?.is_none() {
            return Err(AuthError::validation(format!("role {role_id} does not exist")));
        }
        let Some(element) = self.rules.get_element(element_id).await? else {
            return Err(AuthError::validation(format!("element {element_id} does not exist")));
        };
        match self.rules.find_rule(role_id, &element.name).await? {
            Some(existing) if Some(existing.id) != current => Err(DomainError::conflict(format!(
                "a rule for role {role_id} on '{}' already exists",
                element.name
            ))
            .into()),
            _ => Ok(()),
        }
    }
}
