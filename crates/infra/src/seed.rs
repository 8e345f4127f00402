//! Idempotent seeding of the default rule table and demo accounts.

use tracing::{info, instrument, warn};

use rolegate_auth::password::{self, PasswordError};
use rolegate_auth::roles::{ACCESS_RULES_ELEMENT, DEFAULT_ROLE, DEFAULT_ROLE_DESCRIPTION, USERS_ELEMENT};
use rolegate_auth::{Capabilities, NewRule, NewUser, RuleRepository, StoreError, UserRepository};

pub const DEMO_PASSWORD: &str = "Test123";

const ROLES: &[(&str, &str)] = &[
    ("admin", "Administrator"),
    ("manager", "Manager"),
    (DEFAULT_ROLE, DEFAULT_ROLE_DESCRIPTION),
    ("guest", "Guest"),
];

const ELEMENTS: &[(&str, &str)] = &[
    (USERS_ELEMENT, "User accounts"),
    ("products", "Products"),
    ("orders", "Orders"),
    (ACCESS_RULES_ELEMENT, "Access rules"),
];

const MANAGER_ON_USERS: Capabilities = Capabilities {
    create: true,
    read: true,
    read_all: true,
    update: true,
    update_all: true,
    ..Capabilities::NONE
};

const USER_ON_USERS: Capabilities = Capabilities {
    read: true,
    ..Capabilities::NONE
};

/// (role, element, capabilities). Admin holds everything on every element.
fn default_rules() -> Vec<(&'static str, &'static str, Capabilities)> {
    let mut rules: Vec<_> = ELEMENTS
        .iter()
        .map(|(element, _)| ("admin", *element, Capabilities::FULL))
        .collect();
    rules.push(("manager", USERS_ELEMENT, MANAGER_ON_USERS));
    rules.push((DEFAULT_ROLE, USERS_ELEMENT, USER_ON_USERS));
    rules
}

/// (email, first name, role).
const DEMO_USERS: &[(&str, &str, &str)] = &[
    ("admin@test.com", "Admin", "admin"),
    ("manager@test.com", "Manager", "manager"),
    ("user1@example.com", "User1", DEFAULT_ROLE),
    ("user2@example.com", "User2", DEFAULT_ROLE),
    ("user3@example.com", "User3", DEFAULT_ROLE),
    ("user4@example.com", "User4", "guest"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub roles_created: usize,
    pub elements_created: usize,
    pub rules_created: usize,
    pub users_created: usize,
    pub users_refreshed: usize,
}

fn hash_error(e: PasswordError) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Create missing roles, elements and rules. Existing rules are left as they
/// are so administrators' edits survive restarts.
#[instrument(skip(rules), err)]
pub async fn seed_defaults(rules: &dyn RuleRepository) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    for (name, description) in ROLES {
        if rules.find_role(name).await?.is_none() {
            rules.insert_role(name, description).await?;
            report.roles_created += 1;
        }
    }
    for (name, description) in ELEMENTS {
        if rules.find_element(name).await?.is_none() {
            rules.insert_element(name, description).await?;
            report.elements_created += 1;
        }
    }

    for (role_name, element_name, capabilities) in default_rules() {
        let (Some(role), Some(element)) = (
            rules.find_role(role_name).await?,
            rules.find_element(element_name).await?,
        ) else {
            continue;
        };
        if rules.find_rule(role.id, element_name).await?.is_some() {
            continue;
        }
        rules
            .insert_rule(NewRule {
                role_id: role.id,
                element_id: element.id,
                capabilities,
            })
            .await?;
        report.rules_created += 1;
    }

    info!(
        roles = report.roles_created,
        elements = report.elements_created,
        rules = report.rules_created,
        "default rule table seeded"
    );
    Ok(report)
}

/// Create the demo accounts. Existing accounts get their role and active flag
/// restored; their passwords are left alone.
#[instrument(skip(users, rules), err)]
pub async fn seed_demo_users(
    users: &dyn UserRepository,
    rules: &dyn RuleRepository,
) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();

    for (email, first_name, role_name) in DEMO_USERS {
        let Some(role) = rules.find_role(role_name).await? else {
            warn!(email, role = role_name, "role not found; skipping demo user");
            continue;
        };

        match users.find_by_email(email).await? {
            None => {
                users
                    .insert(NewUser {
                        first_name: first_name.to_string(),
                        last_name: None,
                        middle_name: None,
                        email: email.to_string(),
                        password_hash: password::hash_password(DEMO_PASSWORD).map_err(hash_error)?,
                        is_active: true,
                        role_id: Some(role.id),
                    })
                    .await?;
                report.users_created += 1;
            }
            Some(mut existing) if existing.role_id != Some(role.id) || !existing.is_active => {
                if existing.role_id != Some(role.id) {
                    existing.role_id = Some(role.id);
                    users.update(&existing).await?;
                }
                if !existing.is_active {
                    users.reactivate(existing.id).await?;
                }
                report.users_refreshed += 1;
            }
            Some(_) => {}
        }
    }

    info!(
        created = report.users_created,
        refreshed = report.users_refreshed,
        "demo users seeded"
    );
    Ok(report)
}
