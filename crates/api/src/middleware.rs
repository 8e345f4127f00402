use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;
use uuid::Uuid;

use rolegate_auth::{AuthError, SharedAuthorization};

use crate::app::errors::ApiError;
use crate::context::RequestContext;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct AuthState {
    pub authz: Arc<SharedAuthorization>,
}

/// Resolve the caller and attach a [`RequestContext`].
///
/// Never rejects: a missing, malformed, expired or revoked token leaves the
/// request anonymous. [`require_identity`] turns that into `401` where needed.
pub async fn identity_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::now_v7();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
        user_id = tracing::field::Empty,
    );

    async move {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let principal = state.authz.authenticate(header.as_deref()).await;
        if let Some(p) = &principal {
            tracing::Span::current().record("user_id", p.user_id().get());
        }

        req.extensions_mut()
            .insert(RequestContext::new(request_id, principal));

        let mut res = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            res.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        res
    }
    .instrument(span)
    .await
}

/// Route layer for endpoints that need a caller: anonymous requests get
/// `401` before any body or path is parsed.
pub async fn require_identity(req: Request, next: Next) -> Response {
    let authenticated = req
        .extensions()
        .get::<RequestContext>()
        .is_some_and(|ctx| ctx.principal().is_some());
    if !authenticated {
        return ApiError(AuthError::Unauthenticated).into_response();
    }
    next.run(req).await
}
