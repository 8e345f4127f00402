//! Service wiring: stores, token codec and the services built on them.

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use sqlx::postgres::PgPoolOptions;

use rolegate_auth::{
    AccountService, AuthorizationService, IdentityProvider, RuleAdmin, RuleRepository, SharedAuthorization,
    TokenAuthenticator, TokenService, UserAdmin, UserRepository,
};
use rolegate_infra::{
    postgres, seed_defaults, seed_demo_users, InMemoryRuleStore, InMemoryUserStore, PostgresRuleStore,
    PostgresUserStore, Settings,
};

pub struct AppServices {
    pub users: Arc<dyn UserRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub tokens: Arc<TokenService>,
    pub authz: Arc<SharedAuthorization>,
    pub accounts: AccountService,
    pub user_admin: UserAdmin,
    pub rule_admin: RuleAdmin,
}

impl AppServices {
    pub fn new(users: Arc<dyn UserRepository>, rules: Arc<dyn RuleRepository>, tokens: Arc<TokenService>) -> Self {
        let identities: Arc<dyn IdentityProvider> = Arc::new(TokenAuthenticator::new(tokens.clone(), users.clone()));
        let authz = Arc::new(AuthorizationService::new(identities, rules.clone()));

        Self {
            accounts: AccountService::new(users.clone(), rules.clone(), tokens.clone()),
            user_admin: UserAdmin::new(authz.clone(), users.clone(), rules.clone()),
            rule_admin: RuleAdmin::new(authz.clone(), rules.clone()),
            users,
            rules,
            tokens,
            authz,
        }
    }

    /// In-memory stores with the default rule table seeded.
    pub async fn in_memory(tokens: TokenService, seed_demo: bool) -> anyhow::Result<Self> {
        let services = Self::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryRuleStore::new()),
            Arc::new(tokens),
        );
        services.seed(seed_demo).await?;
        Ok(services)
    }

    /// Stores selected by `DATABASE_URL`; schema applied and defaults seeded.
    pub async fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let ttl = Duration::try_hours(settings.token_ttl_hours).context("token lifetime out of range")?;
        let tokens = TokenService::new(settings.jwt_secret.as_bytes())
            .with_ttl(ttl)
            .context("invalid token lifetime")?;

        let Some(url) = settings.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            return Self::in_memory(tokens, settings.seed_demo_users).await;
        };

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .context("failed to connect to Postgres")?;
        postgres::migrate(&pool).await.context("failed to apply schema")?;

        let services = Self::new(
            Arc::new(PostgresUserStore::new(pool.clone())),
            Arc::new(PostgresRuleStore::new(pool)),
            Arc::new(tokens),
        );
        services.seed(settings.seed_demo_users).await?;
        Ok(services)
    }

    async fn seed(&self, demo: bool) -> anyhow::Result<()> {
        seed_defaults(self.rules.as_ref())
            .await
            .context("failed to seed default rules")?;
        if demo {
            seed_demo_users(self.users.as_ref(), self.rules.as_ref())
                .await
                .context("failed to seed demo users")?;
        }
        Ok(())
    }
}
