//! # Principal
//!
//! The authenticated caller, built from the claims of a validated token and
//! stored in request extensions by the authentication stage. Handlers take
//! it as an argument; a request without one is rejected with 401 before the
//! handler body runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::TokenError;
use crate::middleware::{challenge_response, AuthenticationOutcome};

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    /// `sub`
    pub subject: String,
    /// `oid`, the caller's object id in the directory.
    pub object_id: Option<Uuid>,
    /// `tid`
    pub tenant_id: Option<String>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
    /// Delegated scopes from the space-separated `scp` claim.
    pub scopes: Vec<String>,
    /// Application roles from the `roles` claim.
    pub roles: Vec<String>,
    pub issuer: String,
    /// Every claim of the token, verbatim.
    pub claims: Map<String, Value>,
}

impl Principal {
    /// Build a principal from validated token claims. `sub` and `iss` are
    /// required.
    pub fn from_claims(claims: Map<String, Value>) -> Result<Self, TokenError> {
        let text = |name: &str| claims.get(name).and_then(Value::as_str).map(str::to_string);

        let subject = text("sub").ok_or_else(|| TokenError::MissingClaim("sub".into()))?;
        let issuer = text("iss").ok_or_else(|| TokenError::MissingClaim("iss".into()))?;
        let object_id = text("oid").and_then(|oid| oid.parse::<Uuid>().ok());

        let scopes = text("scp")
            .map(|scp| scp.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let roles = match claims.get("roles") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(role)) => vec![role.clone()],
            _ => Vec::new(),
        };

        Ok(Self {
            subject,
            object_id,
            tenant_id: text("tid"),
            name: text("name"),
            preferred_username: text("preferred_username"),
            scopes,
            roles,
            issuer,
            claims,
        })
    }

    /// Best human-readable label: name, then username, then subject.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .unwrap_or(&self.subject)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }
        let outcome = parts
            .extensions
            .get::<AuthenticationOutcome>()
            .cloned()
            .unwrap_or(AuthenticationOutcome::NoResult);
        Err(challenge_response(&outcome))
    }
}
