//! Rule-table administration and decision audit under `/rbac`.
//!
//! Everything except `/explain` is gated by the `access_rules` element.
//! `/explain` shows callers why their own request would be allowed or denied.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    middleware::from_fn,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use rolegate_auth::{AccessRoleRule, Action, AuthError, AuthorizationExplanation, NewRule, RulePatch};
use rolegate_core::RuleId;

use crate::app::dto::ExplainQuery;
use crate::app::errors::ApiResult;
use crate::app::extract::{JsonBody, PathParam, QueryParams};
use crate::app::services::AppServices;
use crate::context::RequestContext;
use crate::middleware::require_identity;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/elements", get(list_elements))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/:id", get(get_rule).patch(update_rule).delete(delete_rule))
        .route("/explain", get(explain))
        .route_layer(from_fn(require_identity))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /rbac/roles
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    let roles = services.rule_admin.roles(ctx.principal()).await?;
    Ok(Json(json!({ "roles": roles })))
}

/// GET /rbac/elements
pub async fn list_elements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    let elements = services.rule_admin.elements(ctx.principal()).await?;
    Ok(Json(json!({ "elements": elements })))
}

/// GET /rbac/rules
pub async fn list_rules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    let rules = services.rule_admin.rules(ctx.principal()).await?;
    Ok(Json(json!({ "rules": rules })))
}

/// POST /rbac/rules - One rule per (role, element).
pub async fn create_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    JsonBody(body): JsonBody<NewRule>,
) -> ApiResult<(StatusCode, Json<AccessRoleRule>)> {
    let rule = services.rule_admin.create_rule(ctx.principal(), body).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// GET /rbac/rules/:id
pub async fn get_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    PathParam(id): PathParam<RuleId>,
) -> ApiResult<Json<AccessRoleRule>> {
    Ok(Json(services.rule_admin.rule(ctx.principal(), id).await?))
}

/// PATCH /rbac/rules/:id
pub async fn update_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    PathParam(id): PathParam<RuleId>,
    JsonBody(body): JsonBody<RulePatch>,
) -> ApiResult<Json<AccessRoleRule>> {
    let rule = services
        .rule_admin
        .update_rule(ctx.principal(), id, body)
        .await?;
    Ok(Json(rule))
}

/// DELETE /rbac/rules/:id
pub async fn delete_rule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    PathParam(id): PathParam<RuleId>,
) -> ApiResult<StatusCode> {
    services.rule_admin.delete_rule(ctx.principal(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /rbac/explain?element=&action=&is_owner= - Why the caller would be
/// allowed or denied.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    QueryParams(query): QueryParams<ExplainQuery>,
) -> ApiResult<Json<AuthorizationExplanation>> {
    let principal = ctx.require()?;
    let action: Action = query.action.parse().map_err(AuthError::from)?;
    let explanation = services
        .authz
        .explain(principal, query.element.trim(), action, query.is_owner)
        .await?;
    Ok(Json(explanation))
}
