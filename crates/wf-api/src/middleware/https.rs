//! # HTTPS Redirection
//!
//! Requests that did not arrive over HTTPS are answered with
//! `307 Temporary Redirect` to the same host and path on the configured
//! `Server:HttpsPort`. The scheme is taken from the request URI, or from
//! `X-Forwarded-Proto` when a proxy terminated TLS. Without an HTTPS port
//! the stage passes everything through.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Redirect target configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpsRedirect {
    https_port: Option<u16>,
}

impl HttpsRedirect {
    /// Logs a warning when no port is configured, since the stage is then
    /// inert.
    pub fn new(https_port: Option<u16>) -> Self {
        if https_port.is_none() {
            tracing::warn!("Server:HttpsPort is not configured; HTTPS redirection is disabled");
        }
        Self { https_port }
    }

    /// `Location` for a plain-HTTP request to `host` (which may carry a
    /// port) and `path_and_query`.
    fn location(&self, host: &str, path_and_query: &str) -> Option<String> {
        let port = self.https_port?;
        let host = strip_port(host);
        Some(match port {
            443 => format!("https://{host}{path_and_query}"),
            port => format!("https://{host}:{port}{path_and_query}"),
        })
    }
}

/// Use with `axum::middleware::from_fn_with_state(redirect, redirect_to_https)`.
pub async fn redirect_to_https(
    State(redirect): State<HttpsRedirect>,
    request: Request,
    next: Next,
) -> Response {
    if redirect.https_port.is_none() || is_https(&request) {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));
    let Some(host) = host else {
        tracing::debug!("HTTPS redirection skipped: request has no host");
        return next.run(request).await;
    };
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match redirect
        .location(&host, path_and_query)
        .and_then(|l| HeaderValue::from_str(&l).ok())
    {
        Some(location) => {
            tracing::debug!(?location, "redirecting to HTTPS");
            (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, location)]).into_response()
        }
        None => next.run(request).await,
    }
}

fn is_https(request: &Request) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    request
        .headers()
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// `example.com:5000` → `example.com`, `[::1]:5000` → `[::1]`.
fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}
