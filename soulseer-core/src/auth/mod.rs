// soulseer-core/src/auth/mod.rs
//
// Resolving "who is calling" is delegated to whatever sits in front of the
// service. The core only ever sees a user id.

use http::HeaderMap;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

pub trait AuthResolver: Send + Sync {
    /// A stable user id, or `None` when the request is unauthenticated.
    fn resolve(&self, headers: &HeaderMap) -> Option<Uuid>;
}

/// Trusts the `x-user-id` header set by an authenticating gateway.
#[derive(Debug, Clone, Default)]
pub struct HeaderAuthResolver;

impl AuthResolver for HeaderAuthResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Uuid> {
        headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }
}
