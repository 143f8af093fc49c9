//! # Authentication & Authorization Stages
//!
//! Two request stages, applied in this order:
//!
//! ```text
//! authenticate (whole app) → authorize (controller routes only) → handler
//! ```
//!
//! [`authenticate`] never rejects. It inserts a [`Principal`] for a valid
//! bearer token and otherwise records an [`AuthenticationOutcome`] so that
//! anonymous endpoints such as the documentation stay reachable.
//!
//! [`authorize`] enforces an [`AuthorizationPolicy`]. It is attached with
//! `route_layer` to the controller router, so every controller route is
//! covered at registration time and unmatched paths still 404.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use serde_json::json;

use crate::error::TokenError;
use crate::metrics::record_authentication;
use crate::principal::Principal;
use crate::validator::TokenValidator;

// ── Outcome ─────────────────────────────────────────────────────────────────

/// Result of the authentication stage when no principal was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticationOutcome {
    /// No credentials were presented.
    NoResult,
    /// Credentials were presented and rejected. Holds a client-safe reason.
    Failed(String),
}

// ── Authentication ──────────────────────────────────────────────────────────

/// Authentication stage. Use with
/// `axum::middleware::from_fn_with_state(validator, authenticate)`.
pub async fn authenticate(
    State(validator): State<Arc<TokenValidator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let credentials = request.headers().typed_try_get::<Authorization<Bearer>>();

    match credentials {
        Ok(None) => {
            record_authentication("no_result");
            request
                .extensions_mut()
                .insert(AuthenticationOutcome::NoResult);
        }
        Err(_) => {
            tracing::debug!("authentication failed: authorization header is not a bearer credential");
            record_authentication("malformed");
            request.extensions_mut().insert(AuthenticationOutcome::Failed(
                "The authorization header is not a Bearer credential".to_string(),
            ));
        }
        Ok(Some(Authorization(bearer))) => match validator.validate(bearer.token()).await {
            Ok(principal) => {
                record_authentication("success");
                request.extensions_mut().insert(principal);
            }
            Err(err) => {
                log_failure(&err);
                record_authentication(err.outcome_label());
                request
                    .extensions_mut()
                    .insert(AuthenticationOutcome::Failed(err.description().to_string()));
            }
        },
    }

    next.run(request).await
}

fn log_failure(err: &TokenError) {
    match err {
        TokenError::Metadata(_) => {
            tracing::info!(error = %err, "authentication failed: signing metadata unavailable")
        }
        _ => tracing::debug!(error = %err, "authentication failed: bearer token rejected"),
    }
}

// ── Authorization ───────────────────────────────────────────────────────────

/// Rule applied to every controller route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationPolicy {
    /// The caller must carry a validated principal.
    AuthenticatedUser,
}

impl AuthorizationPolicy {
    pub fn require_authenticated_user() -> Self {
        Self::AuthenticatedUser
    }

    pub fn is_satisfied_by(&self, principal: Option<&Principal>) -> bool {
        match self {
            Self::AuthenticatedUser => principal.is_some(),
        }
    }
}

/// Authorization stage. Use with
/// `route_layer(from_fn_with_state(policy, authorize))`.
pub async fn authorize(
    State(policy): State<AuthorizationPolicy>,
    request: Request,
    next: Next,
) -> Response {
    if policy.is_satisfied_by(request.extensions().get::<Principal>()) {
        return next.run(request).await;
    }

    let outcome = request
        .extensions()
        .get::<AuthenticationOutcome>()
        .cloned()
        .unwrap_or(AuthenticationOutcome::NoResult);
    tracing::debug!(
        path = %request.uri().path(),
        ?outcome,
        "authorization failed: authenticated user required"
    );
    challenge_response(&outcome)
}

// ── Challenge ───────────────────────────────────────────────────────────────

/// 401 response with a `WWW-Authenticate: Bearer` challenge and the
/// standard JSON error body.
pub fn challenge_response(outcome: &AuthenticationOutcome) -> Response {
    let (challenge, message) = match outcome {
        AuthenticationOutcome::NoResult => (
            "Bearer".to_string(),
            "authentication required".to_string(),
        ),
        AuthenticationOutcome::Failed(reason) => {
            let reason = reason.replace(['"', '\\'], "");
            (
                format!("Bearer error=\"invalid_token\", error_description=\"{reason}\""),
                format!("invalid bearer token: {reason}"),
            )
        }
    };

    let body = json!({
        "error": {
            "code": "UNAUTHORIZED",
            "message": message,
        }
    });
    let challenge = HeaderValue::from_str(&challenge)
        .unwrap_or_else(|_| HeaderValue::from_static("Bearer"));

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, challenge)],
        Json(body),
    )
        .into_response()
}
