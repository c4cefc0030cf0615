//! City search: geocoding normalization and its cache pipeline.

use serde_json::Value;

use crate::cache::{geocoding_key, normalize_query, Namespace, TtlCache, GEOCODING_TTL};
use crate::helpers::{num_field, str_field};
use crate::models::{City, DEFAULT_TIMEZONE, SUPPORTED_COUNTRY_CODE};
use crate::services::open_meteo::OpenMeteoClient;

/// Keep the Brazilian entries of a raw geocoding response, in upstream order.
///
/// Entries without a name or coordinates are skipped; a missing region
/// becomes an empty string and a missing timezone the country default.
pub fn normalize_results(raw: &Value) -> Vec<City> {
    let Some(results) = raw.get("results").and_then(Value::as_array) else {
        return Vec::new();
    };

    results
        .iter()
        .filter(|entry| {
            entry.get("country_code").and_then(Value::as_str) == Some(SUPPORTED_COUNTRY_CODE)
        })
        .filter_map(|entry| {
            let name = str_field(entry, "name")?;
            let latitude = num_field(entry, "latitude")?;
            let longitude = num_field(entry, "longitude")?;
            let admin1 = str_field(entry, "admin1").unwrap_or_default();
            let timezone =
                str_field(entry, "timezone").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
            Some(City::new(&name, &admin1, latitude, longitude, &timezone))
        })
        .collect()
}

/// Search Brazilian cities by name.
///
/// Accent and case variants of a query share one cache entry. An empty result
/// is cached like any other; a failed upstream call yields an empty list and
/// is not cached.
pub async fn search_cities(cache: &TtlCache, client: &OpenMeteoClient, query: &str) -> Vec<City> {
    let key = geocoding_key(query);

    if let Some(cities) = cache.get::<Vec<City>>(Namespace::Geo, &key).await {
        return cities;
    }

    let raw = match client.search(&normalize_query(query)).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("City search for '{}' failed: {}", query, e);
            return Vec::new();
        }
    };

    let cities = normalize_results(&raw);
    tracing::debug!("City search for '{}': {} result(s)", query, cities.len());

    cache.set(Namespace::Geo, &key, &cities, GEOCODING_TTL).await;
    cities
}
