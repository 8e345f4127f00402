//! Process configuration from the environment.

use std::net::SocketAddr;

use anyhow::Context;
use rolegate_auth::token::{DEFAULT_TOKEN_TTL_HOURS, MAX_TOKEN_TTL_HOURS};

const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bind_addr: SocketAddr,
    /// Postgres when set, in-memory stores otherwise.
    pub database_url: Option<String>,
    pub seed_demo_users: bool,
}

impl core::fmt::Debug for Settings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Settings")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("bind_addr", &self.bind_addr)
            .field("database", &self.database_url.is_some())
            .field("seed_demo_users", &self.seed_demo_users)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let token_ttl_hours = match get("TOKEN_TTL_HOURS") {
            Some(raw) => raw
                .parse::<i64>()
                .with_context(|| format!("TOKEN_TTL_HOURS is not an integer: {raw}"))?,
            None => DEFAULT_TOKEN_TTL_HOURS,
        };
        anyhow::ensure!(
            (1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours),
            "TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}"
        );

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR is not a socket address")?;

        let seed_demo_users = match get("SEED_DEMO_USERS").as_deref() {
            None => false,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => anyhow::bail!("SEED_DEMO_USERS must be a boolean, got {other}"),
        };

        Ok(Self {
            jwt_secret,
            token_ttl_hours,
            bind_addr,
            database_url: get("DATABASE_URL"),
            seed_demo_users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.jwt_secret, DEV_JWT_SECRET);
        assert_eq!(s.token_ttl_hours, 24);
        assert_eq!(s.bind_addr.port(), 8080);
        assert!(s.database_url.is_none());
        assert!(!s.seed_demo_users);
    }

    #[test]
    fn values_are_read_and_validated() {
        let s = settings(&[
            ("JWT_SECRET", "s3cret"),
            ("TOKEN_TTL_HOURS", "2"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "postgres://localhost/rolegate"),
            ("SEED_DEMO_USERS", "true"),
        ])
        .unwrap();
        assert_eq!(s.jwt_secret, "s3cret");
        assert_eq!(s.token_ttl_hours, 2);
        assert_eq!(s.bind_addr.port(), 9000);
        assert!(s.database_url.is_some());
        assert!(s.seed_demo_users);

        assert!(settings(&[("TOKEN_TTL_HOURS", "0")]).is_err());
        assert!(settings(&[("TOKEN_TTL_HOURS", "2500000000")]).is_err());
        assert!(settings(&[("TOKEN_TTL_HOURS", "8760")]).is_ok());
        assert!(settings(&[("TOKEN_TTL_HOURS", "soon")]).is_err());
        assert!(settings(&[("SEED_DEMO_USERS", "maybe")]).is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let s = settings(&[("JWT_SECRET", "s3cret"), ("DATABASE_URL", "postgres://u:pw@h/db")]).unwrap();
        let out = format!("{s:?}");
        assert!(!out.contains("s3cret"));
        assert!(!out.contains("pw@h"));
    }
}
