//! Open-Meteo forecast and geocoding client.
//!
//! See: https://open-meteo.com/en/docs and https://open-meteo.com/en/docs/geocoding-api
//!
//! Responses are returned as raw `serde_json::Value`; field extraction is
//! done by the callers so that a single odd field cannot reject a payload.

use std::time::Duration;

use crate::errors::UpstreamError;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

const FORECAST_TIMEOUT: Duration = Duration::from_secs(15);
const GEOCODING_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of geocoding candidates requested.
const GEOCODING_RESULT_COUNT: u32 = 10;
/// Language of place names returned by the geocoder.
const GEOCODING_LANGUAGE: &str = "pt";

pub const CURRENT_FIELDS: [&str; 10] = [
    "temperature_2m",
    "relative_humidity_2m",
    "apparent_temperature",
    "precipitation",
    "wind_speed_10m",
    "wind_gusts_10m",
    "wind_direction_10m",
    "cloud_cover",
    "pressure_msl",
    "vapour_pressure_deficit",
];

pub const DAILY_FIELDS: [&str; 13] = [
    "temperature_2m_max",
    "temperature_2m_min",
    "precipitation_sum",
    "precipitation_hours",
    "precipitation_probability_max",
    "precipitation_probability_mean",
    "wind_speed_10m_max",
    "wind_gusts_10m_max",
    "wind_direction_10m_dominant",
    "shortwave_radiation_sum",
    "sunshine_duration",
    "uv_index_max",
    "et0_fao_evapotranspiration",
];

pub const HOURLY_FIELDS: [&str; 5] = [
    "precipitation_probability",
    "precipitation",
    "wind_speed_10m",
    "wind_gusts_10m",
    "cloud_cover",
];

/// Client for the Open-Meteo APIs.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    forecast_url: String,
    geocoding_url: String,
}

impl OpenMeteoClient {
    pub fn new(forecast_url: &str, geocoding_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            forecast_url: forecast_url.to_string(),
            geocoding_url: geocoding_url.to_string(),
        }
    }

    /// Fetch today's forecast (current, daily and hourly groups) for a point.
    pub async fn fetch_forecast(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<serde_json::Value, UpstreamError> {
        let params = [
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.join(",")),
            ("daily", DAILY_FIELDS.join(",")),
            ("hourly", HOURLY_FIELDS.join(",")),
            ("timezone", "auto".to_string()),
            ("forecast_days", "1".to_string()),
            ("wind_speed_unit", "kmh".to_string()),
            ("temperature_unit", "celsius".to_string()),
            ("precipitation_unit", "mm".to_string()),
        ];

        self.get_json("forecast", &self.forecast_url, &params, FORECAST_TIMEOUT)
            .await
    }

    /// Search places by free-text name.
    pub async fn search(&self, name: &str) -> Result<serde_json::Value, UpstreamError> {
        let params = [
            ("name", name.to_string()),
            ("count", GEOCODING_RESULT_COUNT.to_string()),
            ("language", GEOCODING_LANGUAGE.to_string()),
            ("format", "json".to_string()),
        ];

        self.get_json("geocoding", &self.geocoding_url, &params, GEOCODING_TIMEOUT)
            .await
    }

    async fn get_json(
        &self,
        service: &'static str,
        url: &str,
        params: &[(&str, String)],
        timeout: Duration,
    ) -> Result<serde_json::Value, UpstreamError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| UpstreamError::Request { service, source })?;

        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                service,
                status: response.status(),
            });
        }

        response
            .json()
            .await
            .map_err(|source| UpstreamError::Body { service, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenMeteoClient {
        OpenMeteoClient::new(
            &format!("{}/v1/forecast", server.uri()),
            &format!("{}/v1/search", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_fetch_forecast_sends_field_lists() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "-27.6"))
            .and(query_param("longitude", "-48.6"))
            .and(query_param("hourly", HOURLY_FIELDS.join(",")))
            .and(query_param("daily", DAILY_FIELDS.join(",")))
            .and(query_param("current", CURRENT_FIELDS.join(",")))
            .and(query_param("timezone", "auto"))
            .and(query_param("forecast_days", "1"))
            .and(query_param("wind_speed_unit", "kmh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"timezone": "America/Sao_Paulo"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let body = client_for(&server).fetch_forecast(-27.6, -48.6).await.unwrap();
        assert_eq!(body["timezone"], "America/Sao_Paulo");
    }

    #[tokio::test]
    async fn test_fetch_forecast_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_forecast(-27.6, -48.6)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Status { service: "forecast", .. }));
    }

    #[tokio::test]
    async fn test_fetch_forecast_invalid_json() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .fetch_forecast(-27.6, -48.6)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Body { .. }));
    }

    #[tokio::test]
    async fn test_search_sends_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Sao Paulo"))
            .and(query_param("count", "10"))
            .and(query_param("language", "pt"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let body = client_for(&server).search("Sao Paulo").await.unwrap();
        assert!(body.get("results").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let client = OpenMeteoClient::new(
            "http://127.0.0.1:1/v1/forecast",
            "http://127.0.0.1:1/v1/search",
        );
        let err = client.search("Lages").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Request { service: "geocoding", .. }));
    }
}
