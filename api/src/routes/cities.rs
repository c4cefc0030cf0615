//! GET /api/v1/cities?q=NAME

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::models::City;
use crate::services::geocoding::search_cities;

/// Shortest accepted search query, in characters after trimming.
const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CitiesQuery {
    /// City name or prefix (e.g. "Lages", "são paulo")
    pub q: String,
}

/// Search Brazilian cities by name.
///
/// Upstream failures are not surfaced: the result is then simply empty.
#[utoipa::path(
    get,
    path = "/api/v1/cities",
    tag = "Cities",
    params(CitiesQuery),
    responses(
        (status = 200, description = "Matching cities, upstream order", body = [City]),
        (status = 400, description = "Query shorter than 2 characters", body = ErrorResponse),
    )
)]
pub async fn list_cities(
    State(state): State<AppState>,
    Query(params): Query<CitiesQuery>,
) -> Result<Json<Vec<City>>, AppError> {
    let query = params.q.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(AppError::BadRequest(format!(
            "Query must be at least {} characters long",
            MIN_QUERY_CHARS
        )));
    }

    Ok(Json(search_cities(&state.cache, &state.client, query).await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::services::open_meteo::OpenMeteoClient;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state_for(server: &MockServer) -> AppState {
        AppState {
            cache: TtlCache::memory(),
            client: OpenMeteoClient::new(
                &format!("{}/v1/forecast", server.uri()),
                &format!("{}/v1/search", server.uri()),
            ),
        }
    }

    fn query(q: &str) -> Query<CitiesQuery> {
        Query(CitiesQuery { q: q.to_string() })
    }

    #[tokio::test]
    async fn test_short_query_rejected_without_upstream_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let state = state_for(&server);
        for q in ["", "  ", " a ", "é"] {
            let result = list_cities(State(state.clone()), query(q)).await;
            assert!(matches!(result, Err(AppError::BadRequest(_))), "q={:?}", q);
        }
    }

    #[tokio::test]
    async fn test_query_is_trimmed_before_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Lages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{
                    "name": "Lages", "admin1": "Santa Catarina", "country_code": "BR",
                    "latitude": -27.816, "longitude": -50.326, "timezone": "America/Sao_Paulo"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let Json(cities) = list_cities(State(state_for(&server)), query("  Lages "))
            .await
            .unwrap();
        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].label, "Lages - Santa Catarina - Brasil");
    }

    #[tokio::test]
    async fn test_upstream_failure_is_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let Json(cities) = list_cities(State(state_for(&server)), query("Lages"))
            .await
            .unwrap();
        assert!(cities.is_empty());
    }
}
