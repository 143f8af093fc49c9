//! # Weather Forecast Controller
//!
//! `GET /WeatherForecast`: five randomised daily forecasts. Any caller the
//! global policy admits is served.

use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use wf_auth::Principal;

use crate::error::ErrorBody;
use crate::state::AppState;

const SUMMARIES: [&str; 10] = [
    "Freezing", "Bracing", "Chilly", "Cool", "Mild", "Warm", "Balmy", "Hot", "Sweltering",
    "Scorching",
];

const FORECAST_DAYS: i64 = 5;

/// Forecast for a single day.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecast {
    pub date: DateTime<Utc>,
    pub temperature_c: i32,
    /// Derived from `temperatureC`.
    pub temperature_f: i32,
    pub summary: Option<String>,
}

impl WeatherForecast {
    pub fn new(date: DateTime<Utc>, temperature_c: i32, summary: Option<String>) -> Self {
        Self {
            date,
            temperature_c,
            temperature_f: 32 + (f64::from(temperature_c) / 0.5556) as i32,
            summary,
        }
    }
}

/// Forecasts for the `FORECAST_DAYS` days following `today`.
pub fn forecast<R: Rng>(today: DateTime<Utc>, rng: &mut R) -> Vec<WeatherForecast> {
    (1..=FORECAST_DAYS)
        .map(|day| {
            let summary = SUMMARIES[rng.gen_range(0..SUMMARIES.len())];
            WeatherForecast::new(
                today + Duration::days(day),
                rng.gen_range(-20..55),
                Some(summary.to_string()),
            )
        })
        .collect()
}

/// Build the weather forecast router.
pub fn router() -> Router<AppState> {
    Router::new().route("/WeatherForecast", get(get_weather_forecast))
}

/// GET /WeatherForecast: forecast for the next five days.
#[utoipa::path(
    get,
    path = "/WeatherForecast",
    operation_id = "GetWeatherForecast",
    responses(
        (status = 200, description = "Forecast for the next five days", body = [WeatherForecast]),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
    ),
    tag = "WeatherForecast"
)]
pub async fn get_weather_forecast(principal: Principal) -> Json<Vec<WeatherForecast>> {
    tracing::debug!(caller = %principal.display_name(), "serving forecast");
    Json(forecast(Utc::now(), &mut rand::thread_rng()))
}
