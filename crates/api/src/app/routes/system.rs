use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, Json};
use serde_json::{json, Value};

use rolegate_auth::{AuthError, RuleRepository};

use crate::app::errors::ApiResult;
use crate::app::services::AppServices;
use crate::context::RequestContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /whoami - The resolved caller and their role.
pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    let principal = ctx.require()?;
    let role = match principal.role_id() {
        Some(id) => services
            .rules
            .get_role(id)
            .await
            .map_err(AuthError::from)?
            .map(|r| r.name),
        None => None,
    };

    Ok(Json(json!({
        "request_id": ctx.request_id().to_string(),
        "user_id": principal.user_id(),
        "email": principal.user().email,
        "role": role,
        "token_version": principal.token_version(),
    })))
}
