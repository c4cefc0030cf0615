//! GET /api/v1/weather?city=NAME[&lat=..&lon=..]
//!
//! With coordinates the city name is only a display label. Without them the
//! name is geocoded and must resolve to exactly one city.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::AppState;
use crate::models::{City, WeatherSnapshot};
use crate::services::forecast::get_weather;
use crate::services::geocoding::search_cities;

#[derive(Debug, Deserialize, IntoParams)]
pub struct WeatherQuery {
    /// City name
    pub city: String,
    /// Latitude; used together with `lon` to skip geocoding
    pub lat: Option<f64>,
    /// Longitude; used together with `lat` to skip geocoding
    pub lon: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeatherStatus {
    Ok,
    /// Several cities matched; pick one from `candidates` and retry with coordinates
    Ambiguous,
    NotFound,
}

/// Snapshot for a resolved location.
#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherData {
    pub location: City,
    #[serde(flatten)]
    pub snapshot: WeatherSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherResponse {
    pub status: WeatherStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<WeatherData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<City>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WeatherResponse {
    fn not_found(message: String) -> Self {
        Self {
            status: WeatherStatus::NotFound,
            data: None,
            candidates: None,
            message: Some(message),
        }
    }
}

/// Resolve a location and return its weather snapshot.
///
/// Always answers 200; the outcome is carried in `status`.
#[utoipa::path(
    get,
    path = "/api/v1/weather",
    tag = "Weather",
    params(WeatherQuery),
    responses(
        (status = 200, description = "Lookup outcome: ok, ambiguous or not_found",
         body = WeatherResponse),
    )
)]
pub async fn get_city_weather(
    State(state): State<AppState>,
    Query(params): Query<WeatherQuery>,
) -> Json<WeatherResponse> {
    let location = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => City::from_coordinates(&params.city, lat, lon),
        _ => {
            let mut cities = search_cities(&state.cache, &state.client, &params.city).await;
            match cities.len() {
                0 => return Json(WeatherResponse::not_found("City not found".to_string())),
                1 => cities.remove(0),
                _ => {
                    return Json(WeatherResponse {
                        status: WeatherStatus::Ambiguous,
                        data: None,
                        candidates: Some(cities),
                        message: Some(
                            "Multiple cities found, please specify coordinates".to_string(),
                        ),
                    })
                }
            }
        }
    };

    let response = match get_weather(
        &state.cache,
        &state.client,
        location.latitude,
        location.longitude,
    )
    .await
    {
        Ok(snapshot) => WeatherResponse {
            status: WeatherStatus::Ok,
            data: Some(WeatherData { location, snapshot }),
            candidates: None,
            message: None,
        },
        Err(e) => WeatherResponse::not_found(format!("Error fetching weather data: {}", e)),
    };

    Json(response)
}
