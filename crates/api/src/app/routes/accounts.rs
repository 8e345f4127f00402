//! Self-service account endpoints under `/users`.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};

use rolegate_auth::{ChangePassword, Credentials, ProfileUpdate, ProfileView, RegisterUser};

use crate::app::dto::{LoginResponse, MessageResponse};
use crate::app::errors::ApiResult;
use crate::app::extract::JsonBody;
use crate::app::services::AppServices;
use crate::context::RequestContext;
use crate::middleware::require_identity;

pub fn router() -> Router {
    Router::new()
        .route("/logout", post(logout))
        .route("/profile", get(profile).patch(update_profile))
        .route("/profile/password", post(change_password))
        .route("/profile/deactivate", post(deactivate))
        .route_layer(from_fn(require_identity))
        .route("/registration", post(register))
        .route("/login", post(login))
}

/// POST /users/registration
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<RegisterUser>,
) -> ApiResult<(StatusCode, Json<ProfileView>)> {
    let user = services.accounts.register(body).await?;
    Ok((StatusCode::CREATED, Json(user.profile())))
}

/// POST /users/login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    JsonBody(body): JsonBody<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let outcome = services.accounts.login(body).await?;
    Ok(Json(outcome.into()))
}

/// POST /users/logout - Revokes every token of the caller.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<MessageResponse>> {
    services.accounts.logout(ctx.require()?).await?;
    Ok(Json(MessageResponse::new("logged out")))
}

/// GET /users/profile
pub async fn profile(Extension(ctx): Extension<RequestContext>) -> ApiResult<Json<ProfileView>> {
    Ok(Json(ctx.require()?.user().profile()))
}

/// PATCH /users/profile
pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(body): JsonBody<ProfileUpdate>,
) -> ApiResult<Json<ProfileView>> {
    let user = services.accounts.update_profile(ctx.require()?, body).await?;
    Ok(Json(user.profile()))
}

/// POST /users/profile/password - Revokes every token on success.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(body): JsonBody<ChangePassword>,
) -> ApiResult<Json<MessageResponse>> {
    services.accounts.change_password(ctx.require()?, body).await?;
    Ok(Json(MessageResponse::new("password changed; please log in again")))
}

/// POST /users/profile/deactivate
pub async fn deactivate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<MessageResponse>> {
    services.accounts.deactivate_self(ctx.require()?).await?;
    Ok(Json(MessageResponse::new("account deactivated")))
}
