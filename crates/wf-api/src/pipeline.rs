//! # Pipeline Assembly
//!
//! ```text
//! TraceLayer → diagnostics → HTTPS redirection → routing
//!   → authentication → authorization (controllers only) → docs / controllers
//! ```
//!
//! Diagnostics and HTTPS redirection wrap a router that only has a fallback
//! service, so they run before any route is resolved. Authentication is a
//! layer on the routed application; the authorization policy is a
//! `route_layer` on the controller router, which leaves the documentation
//! endpoints anonymous and unknown paths a plain 404.

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;
use wf_auth::{authenticate, authorize};

use crate::middleware::{diagnostics, https, tracing_layer};
use crate::openapi;
use crate::routes;
use crate::state::AppState;

/// Assemble the request pipeline around `controllers`.
pub fn assemble(state: AppState, controllers: Router<AppState>) -> Router {
    let controllers = if controllers.has_routes() {
        controllers.route_layer(from_fn_with_state(state.policy, authorize))
    } else {
        controllers
    };

    let routed = Router::new()
        .merge(openapi::router())
        .merge(controllers)
        .layer(from_fn_with_state(
            Arc::clone(&state.validator),
            authenticate,
        ))
        .with_state(state.clone());

    let redirect = https::HttpsRedirect::new(state.settings.server.https_port);

    Router::new()
        .fallback_service(routed)
        .layer(from_fn_with_state(redirect, https::redirect_to_https))
        .layer(diagnostics::layer(&state.environment))
        .layer(tracing_layer::layer())
}

/// The application with every controller registered.
pub fn app(state: AppState) -> Router {
    assemble(state, routes::router())
}
