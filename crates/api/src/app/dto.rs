use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use rolegate_auth::{AdminUserUpdate, LoginOutcome, ProfileView};
use rolegate_core::RoleId;

// -------------------------
// Request DTOs
// -------------------------

/// PATCH body for `/admin/users/:id`.
///
/// `"role_id": null` clears the role; omitting the key leaves it alone.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub middle_name: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub role_id: Option<Option<RoleId>>,
}

impl From<UpdateUserRequest> for AdminUserUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        AdminUserUpdate {
            first_name: req.first_name,
            last_name: req.last_name,
            middle_name: req.middle_name,
            is_active: req.is_active,
            role_id: req.role_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub element: String,
    pub action: String,
    #[serde(default)]
    pub is_owner: bool,
}

fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: ProfileView,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        LoginResponse {
            access_token: outcome.token.access_token,
            token_type: outcome.token.token_type,
            expires_at: outcome.token.expires_at,
            user: outcome.user.profile(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}
