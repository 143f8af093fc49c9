//! # wf-api: Weather Forecast API Host
//!
//! Axum host that admits only callers holding a valid bearer token from the
//! configured Azure AD tenant, and documents itself with an OpenAPI document
//! whose UI can sign in through the OAuth2 implicit flow.
//!
//! ## API Surface
//!
//! | Route                             | Module                          | Auth      |
//! |-----------------------------------|---------------------------------|-----------|
//! | `GET /WeatherForecast`            | [`routes::weather_forecast`]    | required  |
//! | `GET /swagger/v0.1/swagger.json`  | [`openapi`]                     | anonymous |
//! | `GET /swagger`, `/swagger/index.html` | [`openapi`]                 | anonymous |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → Diagnostics → HttpsRedirect → routing → authenticate → authorize → handler
//! ```
//!
//! See [`pipeline`] for how the stages are assembled.

pub mod error;
pub mod middleware;
pub mod openapi;
pub mod pipeline;
pub mod routes;
pub mod state;

pub use pipeline::{app, assemble};
pub use state::{AppState, BootstrapError};
