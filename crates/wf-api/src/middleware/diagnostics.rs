//! # Panic Diagnostics
//!
//! Outermost stage after tracing. A panicking handler is turned into a 500:
//! in `Development` the response is an HTML page showing the panic message,
//! elsewhere it is the generic JSON error body.

use std::any::Any;

use axum::body::Body;
use axum::http::{header, Response, StatusCode};
use tower_http::catch_panic::{CatchPanicLayer, ResponseForPanic};
use wf_core::HostEnvironment;

use crate::error::ErrorBody;

/// Builds the response for a caught panic.
#[derive(Debug, Clone, Copy)]
pub struct PanicResponder {
    developer_page: bool,
}

impl PanicResponder {
    pub fn for_environment(environment: &HostEnvironment) -> Self {
        Self {
            developer_page: environment.is_development(),
        }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let message = panic_message(err.as_ref());
        tracing::error!(panic = %message, "request handler panicked");

        let (content_type, body) = if self.developer_page {
            ("text/html; charset=utf-8", Body::from(developer_page(&message)))
        } else {
            let body = serde_json::to_vec(&ErrorBody::new(
                "INTERNAL_ERROR",
                "An internal error occurred",
            ))
            .unwrap_or_default();
            ("application/json", Body::from(body))
        };

        let mut response = Response::new(body);
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static(content_type),
        );
        response
    }
}

/// Panic-catching layer for `environment`.
pub fn layer(environment: &HostEnvironment) -> CatchPanicLayer<PanicResponder> {
    CatchPanicLayer::custom(PanicResponder::for_environment(environment))
}

fn panic_message(err: &(dyn Any + Send)) -> String {
    if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    }
}

fn developer_page(message: &str) -> String {
    let message = message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Internal Server Error</title></head>\n\
         <body>\n<h1>An unhandled exception occurred while processing the request.</h1>\n\
         <pre>{message}</pre>\n</body>\n</html>\n"
    )
}
