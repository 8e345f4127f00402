//! `rolegate-auth`: credentials, tokens and the role-based access evaluator.
//!
//! This crate is decoupled from HTTP and storage: repositories are traits
//! implemented in `rolegate-infra`, and the API crate only translates.

pub mod accounts;
pub mod admin;
pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod service;
pub mod store;
pub mod token;
pub mod user;

pub use accounts::{AccountService, LoginOutcome};
pub use admin::{RuleAdmin, SharedAuthorization, UserAdmin};
pub use authorize::{
    decide, explain, AuthorizationExplanation, DenialKind, DenialReason, ReadScope, RuleSnapshot,
};
pub use claims::{validate_claims, TokenClaims, TokenValidationError};
pub use password::PasswordError;
pub use permissions::{AccessRoleRule, Action, Capabilities, NewRule, RulePatch};
pub use principal::Principal;
pub use roles::{BusinessElement, Role};
pub use service::{
    bearer_token, require_principal, AuthError, AuthorizationService, IdentityProvider, TokenAuthenticator,
    TokenRejection,
};
pub use store::{RuleRepository, StoreError, UserRepository};
pub use token::{IssuedToken, TokenError, TokenService, TokenState};
pub use user::{
    AdminCreateUser, AdminUserUpdate, ChangePassword, Credentials, NewUser, ProfileUpdate, ProfileView,
    RegisterUser, User, UserView,
};
