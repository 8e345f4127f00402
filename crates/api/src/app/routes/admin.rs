//! User administration under `/admin/users`, gated by the `users` element.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    middleware::from_fn,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use rolegate_auth::{AdminCreateUser, UserView};
use rolegate_core::UserId;

use crate::app::dto::UpdateUserRequest;
use crate::app::errors::ApiResult;
use crate::app::extract::{JsonBody, PathParam};
use crate::app::services::AppServices;
use crate::context::RequestContext;
use crate::middleware::require_identity;

pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).patch(update_user).delete(delete_user))
        .route_layer(from_fn(require_identity))
}

/// GET /admin/users - Everyone under `read_all`, only the caller under `read`.
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    let users: Vec<UserView> = services
        .user_admin
        .list(ctx.principal())
        .await?
        .iter()
        .map(|u| u.admin_view())
        .collect();
    Ok(Json(json!({ "users": users })))
}

/// POST /admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(body): JsonBody<AdminCreateUser>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = services.user_admin.create(ctx.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(user.admin_view())))
}

/// GET /admin/users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    PathParam(id): PathParam<UserId>,
) -> ApiResult<Json<UserView>> {
    let user = services.user_admin.get(ctx.principal(), id).await?;
    Ok(Json(user.admin_view()))
}

/// PATCH /admin/users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    PathParam(id): PathParam<UserId>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> ApiResult<Json<UserView>> {
    let user = services
        .user_admin
        .update(ctx.principal(), id, body.into())
        .await?;
    Ok(Json(user.admin_view()))
}

/// DELETE /admin/users/:id - Deactivates; the record is kept.
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    PathParam(id): PathParam<UserId>,
) -> ApiResult<StatusCode> {
    services.user_admin.delete(ctx.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
