//! Infrastructure layer: repositories, seeding, configuration.

pub mod config;
pub mod memory;
pub mod postgres;
pub mod seed;

pub use config::Settings;
pub use memory::{InMemoryRuleStore, InMemoryUserStore};
pub use postgres::{PostgresRuleStore, PostgresUserStore};
pub use seed::{seed_defaults, seed_demo_users, SeedReport};
