//! Who may change the federation configuration.

use std::fmt;

use axum::http::{HeaderMap, header};
use constant_time_eq::constant_time_eq;
use peerlink_config::AdminToken;

/// Decides whether the caller of a configuration write is allowed to make it.
///
/// Only consulted while `admin_only_changes` is on.
pub trait ConfigMutationCapability: Send + Sync {
    fn caller_may_mutate_config(&self, headers: &HeaderMap) -> bool;
}

/// Accepts `Authorization: Bearer <token>` matching the configured admin
/// token. Without a configured token every gated write is refused.
pub struct AdminTokenCapability {
    token: Option<AdminToken>,
}

impl fmt::Debug for AdminTokenCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminTokenCapability")
            .field("configured", &self.token.is_some())
            .finish()
    }
}

impl AdminTokenCapability {
    pub fn new(token: Option<AdminToken>) -> Self {
        Self { token }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

impl ConfigMutationCapability for AdminTokenCapability {
    fn caller_may_mutate_config(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.token else {
            return false;
        };
        bearer_token(headers).is_some_and(|presented| {
            constant_time_eq(presented.as_bytes(), expected.expose().as_bytes())
        })
    }
}
