//! Weather snapshot resolution.
//!
//! Turns a raw Open-Meteo forecast payload into a `WeatherSnapshot` and
//! computes the agronomic indicators (water balance, safe temperature range,
//! operation window). `get_weather` wraps this in the cache pipeline:
//! cache lookup, upstream fetch, transform, cache store.
//!
//! Missing or wrong-shaped fields degrade to `None`; only a failed upstream
//! request fails the lookup.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

use crate::cache::{weather_key, Namespace, TtlCache, WEATHER_TTL};
use crate::errors::UpstreamError;
use crate::helpers::{first_num, num_at, num_field, str_field, time_axis};
use crate::models::{
    unit_map, CurrentConditions, Derived, Meta, NextHour, TodaySummary, WaterBalanceClass,
    WeatherSnapshot,
};
use crate::services::open_meteo::OpenMeteoClient;

/// Number of hourly entries exposed as `next_hours`.
const NEXT_HOURS: usize = 6;
/// Number of leading `next_hours` entries checked for the operation window.
const OPERATION_WINDOW_HOURS: usize = 3;
/// Highest rain probability (%) that still allows field operations.
const MAX_OPERATION_PRECIP_PROBABILITY: f64 = 20.0;
/// Highest wind speed (km/h) that still allows field operations.
const MAX_OPERATION_WIND_KMH: f64 = 12.0;
/// Inclusive safe range for the current temperature (°C).
const SAFE_TEMPERATURE_MIN_C: f64 = 22.0;
const SAFE_TEMPERATURE_MAX_C: f64 = 30.0;

/// Classify a daily water balance (mm) into its band.
///
/// Bands: `v <= -6` severe, `-6 < v <= -3` moderate, `-3 < v < -1` mild,
/// `-1 <= v <= 1` neutral, `v > 1` surplus. NaN compares false everywhere and
/// lands in surplus; callers only pass finite differences.
pub fn classify_water_balance(value: f64) -> WaterBalanceClass {
    if value <= -6.0 {
        WaterBalanceClass::SevereDeficit
    } else if value <= -3.0 {
        WaterBalanceClass::ModerateDeficit
    } else if value < -1.0 {
        WaterBalanceClass::MildDeficit
    } else if value <= 1.0 {
        WaterBalanceClass::Neutral
    } else {
        WaterBalanceClass::Surplus
    }
}

/// Precipitation minus reference evapotranspiration, if both are known.
pub fn water_balance(today: &TodaySummary) -> Option<f64> {
    Some(today.precipitation_sum? - today.et0_fao_evapotranspiration?)
}

/// `Some(true)` iff the temperature is within 22 to 30 °C; `None` if unknown.
pub fn temperature_in_safe_range(temperature_c: Option<f64>) -> Option<bool> {
    temperature_c.map(|t| (SAFE_TEMPERATURE_MIN_C..=SAFE_TEMPERATURE_MAX_C).contains(&t))
}

/// Go/no-go for field operations over the first hours of `next_hours`.
///
/// Missing rain probability or wind speed counts as 0 here, unlike the
/// temperature check where a missing value stays unknown.
pub fn operation_window_ok(next_hours: &[NextHour]) -> Option<bool> {
    if next_hours.is_empty() {
        return None;
    }
    Some(next_hours.iter().take(OPERATION_WINDOW_HOURS).all(|hour| {
        hour.precipitation_probability.unwrap_or(0.0) <= MAX_OPERATION_PRECIP_PROBABILITY
            && hour.wind_speed_10m.unwrap_or(0.0) <= MAX_OPERATION_WIND_KMH
    }))
}

/// Parse an Open-Meteo timestamp.
///
/// With `timezone=auto` Open-Meteo sends local times without an offset
/// ("2025-11-28T12:00"); RFC 3339 values are accepted too and compared in UTC.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Index of the hourly entry matching the current observation.
///
/// Exact string match first, then the first hourly time at or after the
/// current time (unparsable hourly entries are skipped). Falls back to 0 when
/// the current time is missing or unparsable, or no hourly time qualifies.
pub fn next_hours_start(current_time: Option<&str>, times: &[Option<&str>]) -> usize {
    let Some(current) = current_time else {
        return 0;
    };
    if let Some(idx) = times.iter().position(|t| *t == Some(current)) {
        return idx;
    }
    let Some(now) = parse_timestamp(current) else {
        return 0;
    };
    times
        .iter()
        .position(|t| t.and_then(parse_timestamp).is_some_and(|t| t >= now))
        .unwrap_or(0)
}

fn current_conditions(current: &Value) -> CurrentConditions {
    CurrentConditions {
        time: str_field(current, "time"),
        temperature_2m: num_field(current, "temperature_2m"),
        relative_humidity_2m: num_field(current, "relative_humidity_2m"),
        apparent_temperature: num_field(current, "apparent_temperature"),
        precipitation: num_field(current, "precipitation"),
        wind_speed_10m: num_field(current, "wind_speed_10m"),
        wind_gusts_10m: num_field(current, "wind_gusts_10m"),
        wind_direction_10m: num_field(current, "wind_direction_10m"),
        cloud_cover: num_field(current, "cloud_cover"),
        pressure_msl: num_field(current, "pressure_msl"),
        vapour_pressure_deficit: num_field(current, "vapour_pressure_deficit"),
    }
}

/// Today's aggregates from the daily arrays, or `None` if `daily.time` is empty.
fn today_summary(daily: &Value) -> Option<TodaySummary> {
    let times = time_axis(daily);
    let first = times.first()?;

    Some(TodaySummary {
        date: first.unwrap_or_default().to_string(),
        temperature_2m_max: first_num(daily, "temperature_2m_max"),
        temperature_2m_min: first_num(daily, "temperature_2m_min"),
        precipitation_sum: first_num(daily, "precipitation_sum"),
        precipitation_hours: first_num(daily, "precipitation_hours"),
        precipitation_probability_max: first_num(daily, "precipitation_probability_max"),
        precipitation_probability_mean: first_num(daily, "precipitation_probability_mean"),
        wind_speed_10m_max: first_num(daily, "wind_speed_10m_max"),
        wind_gusts_10m_max: first_num(daily, "wind_gusts_10m_max"),
        wind_direction_10m_dominant: first_num(daily, "wind_direction_10m_dominant"),
        shortwave_radiation_sum: first_num(daily, "shortwave_radiation_sum"),
        sunshine_duration: first_num(daily, "sunshine_duration"),
        uv_index_max: first_num(daily, "uv_index_max"),
        et0_fao_evapotranspiration: first_num(daily, "et0_fao_evapotranspiration"),
    })
}

fn next_hours(hourly: &Value, current_time: Option<&str>) -> Vec<NextHour> {
    let times = time_axis(hourly);
    let start = next_hours_start(current_time, &times);

    (start..times.len().min(start + NEXT_HOURS))
        .map(|i| NextHour {
            time: times[i].map(str::to_owned),
            precipitation_probability: num_at(hourly, "precipitation_probability", i),
            precipitation: num_at(hourly, "precipitation", i),
            wind_speed_10m: num_at(hourly, "wind_speed_10m", i),
            wind_gusts_10m: num_at(hourly, "wind_gusts_10m", i),
            cloud_cover: num_at(hourly, "cloud_cover", i),
        })
        .collect()
}

/// Build a snapshot from a raw forecast payload. Never fails.
pub fn build_snapshot(raw: &Value) -> WeatherSnapshot {
    let null = Value::Null;
    let current = current_conditions(raw.get("current").unwrap_or(&null));
    let today = today_summary(raw.get("daily").unwrap_or(&null));
    let next_hours = next_hours(raw.get("hourly").unwrap_or(&null), current.time.as_deref());

    let water_balance_mm = today.as_ref().and_then(water_balance);
    let derived = Derived {
        water_balance_mm,
        water_balance_class: water_balance_mm.map(classify_water_balance),
        operation_window_ok: operation_window_ok(&next_hours),
        temperature_in_safe_range: temperature_in_safe_range(current.temperature_2m),
    };

    let units = unit_map();
    WeatherSnapshot {
        current,
        today,
        next_hours,
        derived,
        meta: Meta {
            timezone: str_field(raw, "timezone"),
            units: units.clone(),
        },
        units,
    }
}

/// Resolve the weather snapshot for a coordinate pair.
///
/// Served from cache when possible; otherwise fetched, transformed and cached.
/// Upstream failures propagate so callers can tell them apart from "not found".
pub async fn get_weather(
    cache: &TtlCache,
    client: &OpenMeteoClient,
    latitude: f64,
    longitude: f64,
) -> Result<WeatherSnapshot, UpstreamError> {
    let key = weather_key(latitude, longitude);

    if let Some(snapshot) = cache.get::<WeatherSnapshot>(Namespace::Weather, &key).await {
        return Ok(snapshot);
    }

    let raw = client
        .fetch_forecast(latitude, longitude)
        .await
        .inspect_err(|e| tracing::error!("Forecast fetch failed for ({}): {}", key, e))?;

    let snapshot = build_snapshot(&raw);
    if let Some(class) = snapshot.derived.water_balance_class {
        tracing::debug!("Water balance for ({}): {}", key, class.label());
    }

    cache
        .set(Namespace::Weather, &key, &snapshot, WEATHER_TTL)
        .await;
    Ok(snapshot)
}
