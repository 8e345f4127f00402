use rolegate_auth::{require_principal, AuthError, Principal};
use uuid::Uuid;

/// Per-request context attached by the identity middleware.
///
/// Present on every request; `principal` is `None` for anonymous callers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    principal: Option<Principal>,
}

impl RequestContext {
    pub fn new(request_id: Uuid, principal: Option<Principal>) -> Self {
        Self { request_id, principal }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The caller, or `Unauthenticated`.
    pub fn require(&self) -> Result<&Principal, AuthError> {
        require_principal(self.principal())
    }
}
