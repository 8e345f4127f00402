//! In-memory repositories for tests and dev.
//!
//! Every mutation holds the write lock for its whole read-modify-write, so
//! `bump_token_version` and `deactivate` are atomic per store.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use rolegate_auth::{
    AccessRoleRule, BusinessElement, NewRule, NewUser, Role, RuleRepository, StoreError, User, UserRepository,
};
use rolegate_core::{ElementId, RoleId, RuleId, UserId};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UserTable {
    last_id: i64,
    rows: BTreeMap<UserId, User>,
}

impl UserTable {
    fn email_taken(&self, email: &str, except: Option<UserId>) -> bool {
        self.rows
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<UserTable>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, UserTable>, StoreError> {
        self.inner.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, UserTable>, StoreError> {
        self.inner.write().map_err(poisoned)
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.rows.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.read()?.rows.values().cloned().collect())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.sealed().map_err(|e| StoreError::Invalid(e.to_string()))?;
        let mut table = self.write()?;
        if table.email_taken(&user.email, None) {
            return Err(StoreError::Conflict(format!("email {} already registered", user.email)));
        }

        table.last_id += 1;
        let now = Utc::now();
        let stored = User {
            id: UserId::new(table.last_id),
            first_name: user.first_name,
            last_name: user.last_name,
            middle_name: user.middle_name,
            email: user.email,
            password_hash: user.password_hash,
            is_active: user.is_active,
            token_version: 0,
            role_id: user.role_id,
            created_at: now,
            updated_at: now,
        };
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let next = user.clone().sealed().map_err(|e| StoreError::Invalid(e.to_string()))?;
        let mut table = self.write()?;
        if table.email_taken(&next.email, Some(next.id)) {
            return Err(StoreError::Conflict(format!("email {} already registered", next.email)));
        }
        let row = table.rows.get_mut(&next.id).ok_or(StoreError::NotFound)?;

        row.first_name = next.first_name;
        row.last_name = next.last_name;
        row.middle_name = next.middle_name;
        row.email = next.email;
        row.password_hash = next.password_hash;
        row.role_id = next.role_id;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn bump_token_version(&self, id: UserId) -> Result<i64, StoreError> {
        let mut table = self.write()?;
        let row = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.token_version += 1;
        row.updated_at = Utc::now();
        Ok(row.token_version)
    }

    async fn deactivate(&self, id: UserId) -> Result<User, StoreError> {
        let mut table = self.write()?;
        let row = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.is_active = false;
        row.token_version += 1;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
    async fn reactivate(&self, id: UserId) -> Result<User, StoreError> {
        let mut table = self.write()?;
        let row = table.rows.get_mut(&id).ok_or(StoreError::NotFound)?;
        row.is_active = true;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles, elements, rules
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct RuleTables {
    last_role: i64,
    last_element: i64,
    last_rule: i64,
    roles: BTreeMap<RoleId, Role>,
    elements: BTreeMap<ElementId, BusinessElement>,
    rules: BTreeMap<RuleId, AccessRoleRule>,
}

impl RuleTables {
    fn check_refs(&self, role_id: RoleId, element_id: ElementId) -> Result<(), StoreError> {
        if !self.roles.contains_key(&role_id) {
            return Err(StoreError::Invalid(format!("role {role_id} does not exist")));
        }
        if !self.elements.contains_key(&element_id) {
            return Err(StoreError::Invalid(format!("element {element_id} does not exist")));
        }
        Ok(())
    }

    fn check_unique(&self, role_id: RoleId, element_id: ElementId, except: Option<RuleId>) -> Result<(), StoreError> {
        let taken = self
            .rules
            .values()
            .any(|r| r.role_id == role_id && r.element_id == element_id && Some(r.id) != except);
        if taken {
            return Err(StoreError::Conflict(format!(
                "rule for role {role_id} and element {element_id} already exists"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    inner: RwLock<RuleTables>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RuleTables>, StoreError> {
        self.inner.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RuleTables>, StoreError> {
        self.inner.write().map_err(poisoned)
    }
}

#[async_trait::async_trait]
impl RuleRepository for InMemoryRuleStore {
    async fn find_rule(&self, role_id: RoleId, element: &str) -> Result<Option<AccessRoleRule>, StoreError> {
        let tables = self.read()?;
        let Some(element_id) = tables.elements.values().find(|e| e.name == element).map(|e| e.id) else {
            return Ok(None);
        };
        Ok(tables
            .rules
            .values()
            .find(|r| r.role_id == role_id && r.element_id == element_id)
            .cloned())
    }

    async fn list_rules(&self) -> Result<Vec<AccessRoleRule>, StoreError> {
        Ok(self.read()?.rules.values().cloned().collect())
    }

    async fn get_rule(&self, id: RuleId) -> Result<Option<AccessRoleRule>, StoreError> {
        Ok(self.read()?.rules.get(&id).cloned())
    }

    async fn insert_rule(&self, rule: NewRule) -> Result<AccessRoleRule, StoreError> {
        let mut tables = self.write()?;
        tables.check_refs(rule.role_id, rule.element_id)?;
        tables.check_unique(rule.role_id, rule.element_id, None)?;

        tables.last_rule += 1;
        let now = Utc::now();
        let stored = AccessRoleRule {
            id: RuleId::new(tables.last_rule),
            role_id: rule.role_id,
            element_id: rule.element_id,
            capabilities: rule.capabilities,
            created_at: now,
            updated_at: now,
        };
        tables.rules.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_rule(&self, rule: &AccessRoleRule) -> Result<AccessRoleRule, StoreError> {
        let mut tables = self.write()?;
        if !tables.rules.contains_key(&rule.id) {
            return Err(StoreError::NotFound);
        }
        tables.check_refs(rule.role_id, rule.element_id)?;
        tables.check_unique(rule.role_id, rule.element_id, Some(rule.id))?;

        let row = tables.rules.get_mut(&rule.id).ok_or(StoreError::NotFound)?;
        row.role_id = rule.role_id;
        row.element_id = rule.element_id;
        row.capabilities = rule.capabilities;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        self.write()?.rules.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(self.read()?.roles.values().cloned().collect())
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.read()?.roles.values().find(|r| r.name == name).cloned())
    }

    async fn insert_role(&self, name: &str, description: &str) -> Result<Role, StoreError> {
        let mut tables = self.write()?;
        if tables.roles.values().any(|r| r.name == name) {
            return Err(StoreError::Conflict(format!("role {name} already exists")));
        }
        tables.last_role += 1;
        let now = Utc::now();
        let role = Role {
            id: RoleId::new(tables.last_role),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn list_elements(&self) -> Result<Vec<BusinessElement>, StoreError> {
        Ok(self.read()?.elements.values().cloned().collect())
    }

    async fn get_element(&self, id: ElementId) -> Result<Option<BusinessElement>, StoreError> {
        Ok(self.read()?.elements.get(&id).cloned())
    }

    async fn find_element(&self, name: &str) -> Result<Option<BusinessElement>, StoreError> {
        Ok(self.read()?.elements.values().find(|e| e.name == name).cloned())
    }

    async fn insert_element(&self, name: &str, description: &str) -> Result<BusinessElement, StoreError> {
        let mut tables = self.write()?;
        if tables.elements.values().any(|e| e.name == name) {
            return Err(StoreError::Conflict(format!("element {name} already exists")));
        }
        tables.last_element += 1;
        let now = Utc::now();
        let element = BusinessElement {
            id: ElementId::new(tables.last_element),
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.elements.insert(element.id, element.clone());
        Ok(element)
    }
}
