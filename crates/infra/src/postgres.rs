//! Postgres-backed repositories.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Invalid` |
//! | Database (check constraint violation) | `23514` | `Invalid` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |
//!
//! ## Token versions
//!
//! `bump_token_version` and `deactivate` are single `UPDATE ... SET
//! token_version = token_version + 1 ... RETURNING` statements, so concurrent
//! bumps never lose an increment. `update` does not write `token_version`.

use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use rolegate_auth::{
    AccessRoleRule, BusinessElement, Capabilities, NewRule, NewUser, Role, RuleRepository, StoreError, User,
    UserRepository,
};
use rolegate_core::{ElementId, RoleId, RuleId, UserId};

/// Schema statements, applied in order by [`migrate`].
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS business_elements (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT,
        middle_name TEXT,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL CHECK (password_hash LIKE '$argon2%'),
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        token_version BIGINT NOT NULL DEFAULT 0 CHECK (token_version >= 0),
        role_id BIGINT REFERENCES roles(id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS access_role_rules (
        id BIGSERIAL PRIMARY KEY,
        role_id BIGINT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        element_id BIGINT NOT NULL REFERENCES business_elements(id) ON DELETE CASCADE,
        create_permission BOOLEAN NOT NULL DEFAULT FALSE,
        read_permission BOOLEAN NOT NULL DEFAULT FALSE,
        read_all_permission BOOLEAN NOT NULL DEFAULT FALSE,
        update_permission BOOLEAN NOT NULL DEFAULT FALSE,
        update_all_permission BOOLEAN NOT NULL DEFAULT FALSE,
        delete_permission BOOLEAN NOT NULL DEFAULT FALSE,
        delete_all_permission BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (role_id, element_id)
    )
    "#,
];

/// Create tables if they do not exist.
#[instrument(skip(pool), err)]
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
    }
    Ok(())
}

const USER_COLUMNS: &str = "id, first_name, last_name, middle_name, email, password_hash, is_active, \
                            token_version, role_id, created_at, updated_at";

const RULE_COLUMNS: &str = "id, role_id, element_id, create_permission, read_permission, \
                            read_all_permission, update_permission, update_all_permission, \
                            delete_permission, delete_all_permission, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait::async_trait]
impl UserRepository for PostgresUserStore {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip(self, user), fields(email = %user.email), err)]
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.sealed().map_err(|e| StoreError::Invalid(e.to_string()))?;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (first_name, last_name, middle_name, email, password_hash, is_active, role_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.middle_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.role_id.map(|r| r.get()))
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        user_from_row(&row)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update(&self, user: &User) -> Result<User, StoreError> {
        let user = user.clone().sealed().map_err(|e| StoreError::Invalid(e.to_string()))?;
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                first_name = $2,
                last_name = $3,
                middle_name = $4,
                email = $5,
                password_hash = $6,
                role_id = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id.get())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.middle_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role_id.map(|r| r.get()))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?
        .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn bump_token_version(&self, id: UserId) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE users
            SET token_version = token_version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING token_version
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("bump_token_version", e))?
        .ok_or(StoreError::NotFound)?;

        row.try_get::<i64, _>("token_version")
            .map_err(|e| decode_error("token_version", e))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn deactivate(&self, id: UserId) -> Result<User, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET is_active = FALSE, token_version = token_version + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("deactivate_user", e))?
        .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn reactivate(&self, id: UserId) -> Result<User, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET is_active = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reactivate_user", e))?
        .ok_or(StoreError::NotFound)?;
        user_from_row(&row)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles, elements, rules
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresRuleStore {
    pool: Arc<PgPool>,
}

impl PostgresRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    async fn named_rows(&self, table: &'static str, operation: &str) -> Result<Vec<PgRow>, StoreError> {
        sqlx::query(&format!(
            "SELECT id, name, description, created_at, updated_at FROM {table} ORDER BY id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn named_row(
        &self,
        table: &'static str,
        column: &'static str,
        value: NamedKey<'_>,
        operation: &str,
    ) -> Result<Option<PgRow>, StoreError> {
        let query = format!("SELECT id, name, description, created_at, updated_at FROM {table} WHERE {column} = $1");
        let query = sqlx::query(&query);
        let query = match value {
            NamedKey::Id(id) => query.bind(id),
            NamedKey::Name(name) => query.bind(name),
        };
        query
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn insert_named(
        &self,
        table: &'static str,
        name: &str,
        description: &str,
        operation: &str,
    ) -> Result<PgRow, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO {table} (name, description) VALUES ($1, $2) \
             RETURNING id, name, description, created_at, updated_at"
        ))
        .bind(name)
        .bind(description)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error(operation, e))
    }
}

enum NamedKey<'a> {
    Id(i64),
    Name(&'a str),
}

#[async_trait::async_trait]
impl RuleRepository for PostgresRuleStore {
    #[instrument(skip(self), fields(role_id = %role_id), err)]
    async fn find_rule(&self, role_id: RoleId, element: &str) -> Result<Option<AccessRoleRule>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT r.id, r.role_id, r.element_id, r.create_permission, r.read_permission,
                   r.read_all_permission, r.update_permission, r.update_all_permission,
                   r.delete_permission, r.delete_all_permission, r.created_at, r.updated_at
            FROM access_role_rules r
            JOIN business_elements e ON e.id = r.element_id
            WHERE r.role_id = $1 AND e.name = $2
            "#,
        )
        .bind(role_id.get())
        .bind(element)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_rule", e))?;
        row.as_ref().map(rule_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_rules(&self) -> Result<Vec<AccessRoleRule>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {RULE_COLUMNS} FROM access_role_rules ORDER BY id ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_rules", e))?;
        rows.iter().map(rule_from_row).collect()
    }

    #[instrument(skip(self), fields(rule_id = %id), err)]
    async fn get_rule(&self, id: RuleId) -> Result<Option<AccessRoleRule>, StoreError> {
        let row = sqlx::query(&format!("SELECT {RULE_COLUMNS} FROM access_role_rules WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_rule", e))?;
        row.as_ref().map(rule_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn insert_rule(&self, rule: NewRule) -> Result<AccessRoleRule, StoreError> {
        let caps = rule.capabilities;
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO access_role_rules (
                role_id, element_id, create_permission, read_permission, read_all_permission,
                update_permission, update_all_permission, delete_permission, delete_all_permission
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(rule.role_id.get())
        .bind(rule.element_id.get())
        .bind(caps.create)
        .bind(caps.read)
        .bind(caps.read_all)
        .bind(caps.update)
        .bind(caps.update_all)
        .bind(caps.delete)
        .bind(caps.delete_all)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_rule", e))?;
        rule_from_row(&row)
    }

    #[instrument(skip(self), fields(rule_id = %rule.id), err)]
    async fn update_rule(&self, rule: &AccessRoleRule) -> Result<AccessRoleRule, StoreError> {
        let caps = rule.capabilities;
        let row = sqlx::query(&format!(
            r#"
            UPDATE access_role_rules SET
                role_id = $2,
                element_id = $3,
                create_permission = $4,
                read_permission = $5,
                read_all_permission = $6,
                update_permission = $7,
                update_all_permission = $8,
                delete_permission = $9,
                delete_all_permission = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(rule.id.get())
        .bind(rule.role_id.get())
        .bind(rule.element_id.get())
        .bind(caps.create)
        .bind(caps.read)
        .bind(caps.read_all)
        .bind(caps.update)
        .bind(caps.update_all)
        .bind(caps.delete)
        .bind(caps.delete_all)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_rule", e))?
        .ok_or(StoreError::NotFound)?;
        rule_from_row(&row)
    }

    #[instrument(skip(self), fields(rule_id = %id), err)]
    async fn delete_rule(&self, id: RuleId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM access_role_rules WHERE id = $1")
            .bind(id.get())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_rule", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let rows = self.named_rows("roles", "list_roles").await?;
        rows.iter().map(role_from_row).collect()
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let row = self.named_row("roles", "id", NamedKey::Id(id.get()), "get_role").await?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let row = self.named_row("roles", "name", NamedKey::Name(name), "find_role").await?;
        row.as_ref().map(role_from_row).transpose()
    }

    #[instrument(skip(self, description), err)]
    async fn insert_role(&self, name: &str, description: &str) -> Result<Role, StoreError> {
        let row = self.insert_named("roles", name, description, "insert_role").await?;
        role_from_row(&row)
    }

    async fn list_elements(&self) -> Result<Vec<BusinessElement>, StoreError> {
        let rows = self.named_rows("business_elements", "list_elements").await?;
        rows.iter().map(element_from_row).collect()
    }

    async fn get_element(&self, id: ElementId) -> Result<Option<BusinessElement>, StoreError> {
        let row = self
            .named_row("business_elements", "id", NamedKey::Id(id.get()), "get_element")
            .await?;
        row.as_ref().map(element_from_row).transpose()
    }

    async fn find_element(&self, name: &str) -> Result<Option<BusinessElement>, StoreError> {
        let row = self
            .named_row("business_elements", "name", NamedKey::Name(name), "find_element")
            .await?;
        row.as_ref().map(element_from_row).transpose()
    }

    #[instrument(skip(self, description), err)]
    async fn insert_element(&self, name: &str, description: &str) -> Result<BusinessElement, StoreError> {
        let row = self
            .insert_named("business_elements", name, description, "insert_element")
            .await?;
        element_from_row(&row)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

fn decode_error(column: &str, err: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to read column {column}: {err}"))
}

fn col<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| decode_error(column, e))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::new(col(row, "id")?),
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        middle_name: col(row, "middle_name")?,
        email: col(row, "email")?,
        password_hash: col(row, "password_hash")?,
        is_active: col(row, "is_active")?,
        token_version: col(row, "token_version")?,
        role_id: col::<Option<i64>>(row, "role_id")?.map(RoleId::new),
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn rule_from_row(row: &PgRow) -> Result<AccessRoleRule, StoreError> {
    Ok(AccessRoleRule {
        id: RuleId::new(col(row, "id")?),
        role_id: RoleId::new(col(row, "role_id")?),
        element_id: ElementId::new(col(row, "element_id")?),
        capabilities: Capabilities {
            create: col(row, "create_permission")?,
            read: col(row, "read_permission")?,
            read_all: col(row, "read_all_permission")?,
            update: col(row, "update_permission")?,
            update_all: col(row, "update_all_permission")?,
            delete: col(row, "delete_permission")?,
            delete_all: col(row, "delete_all_permission")?,
        },
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    Ok(Role {
        id: RoleId::new(col(row, "id")?),
        name: col(row, "name")?,
        description: col(row, "description")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn element_from_row(row: &PgRow) -> Result<BusinessElement, StoreError> {
    Ok(BusinessElement {
        id: ElementId::new(col(row, "id")?),
        name: col(row, "name")?,
        description: col(row, "description")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") | Some("23514") => StoreError::Invalid(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {}", operation)),
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
