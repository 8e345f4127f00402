//! Shared primitives for `rolegate`: identifiers and domain errors.
//!
//! No infrastructure concerns live here.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ElementId, RoleId, RuleId, UserId};
