//! # Controllers
//!
//! Every router returned here is guarded by the global authorization policy
//! when the pipeline is assembled; routes do not opt in individually.

pub mod weather_forecast;

use axum::Router;

use crate::state::AppState;

/// All controller routes.
pub fn router() -> Router<AppState> {
    Router::new().merge(weather_forecast::router())
}
