use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// ISO country code of the only country returned by city search.
pub const SUPPORTED_COUNTRY_CODE: &str = "BR";
/// Display name of the supported country, used in `City::label`.
pub const COUNTRY_LABEL: &str = "Brasil";
/// Timezone assumed when the geocoder omits one.
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

/// Unit of every field that appears in a snapshot, identical across responses.
pub const UNITS: [(&str, &str); 12] = [
    ("temperature_2m", "°C"),
    ("relative_humidity_2m", "%"),
    ("apparent_temperature", "°C"),
    ("precipitation", "mm"),
    ("wind_speed_10m", "km/h"),
    ("wind_gusts_10m", "km/h"),
    ("cloud_cover", "%"),
    ("pressure_msl", "hPa"),
    ("vapour_pressure_deficit", "kPa"),
    ("et0_fao_evapotranspiration", "mm"),
    ("shortwave_radiation_sum", "MJ/m²"),
    ("sunshine_duration", "min"),
];

/// The fixed field → unit mapping as an owned map.
pub fn unit_map() -> BTreeMap<String, String> {
    UNITS
        .iter()
        .map(|(field, unit)| (field.to_string(), unit.to_string()))
        .collect()
}

/// A city in the supported country, as produced by the geocoding normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct City {
    pub name: String,
    /// State/region; empty when the geocoder has none
    pub admin1: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    /// Display string `"{name} - {admin1} - {country}"`
    pub label: String,
}

impl City {
    pub fn new(name: &str, admin1: &str, latitude: f64, longitude: f64, timezone: &str) -> Self {
        Self {
            name: name.to_string(),
            admin1: admin1.to_string(),
            country: COUNTRY_LABEL.to_string(),
            latitude,
            longitude,
            timezone: timezone.to_string(),
            label: format!("{} - {} - {}", name, admin1, COUNTRY_LABEL),
        }
    }

    /// Location for a lookup by explicit coordinates, where no region is known.
    pub fn from_coordinates(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.to_string(),
            admin1: String::new(),
            country: COUNTRY_LABEL.to_string(),
            latitude,
            longitude,
            timezone: DEFAULT_TIMEZONE.to_string(),
            label: format!("{} - {}", name, COUNTRY_LABEL),
        }
    }
}

/// Point-in-time conditions. Every field is `None` when upstream omitted it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentConditions {
    /// Observation time as reported upstream (local time, ISO 8601)
    pub time: Option<String>,
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub apparent_temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub wind_gusts_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub pressure_msl: Option<f64>,
    pub vapour_pressure_deficit: Option<f64>,
}

/// Daily aggregates for the forecast day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TodaySummary {
    pub date: String,
    pub temperature_2m_max: Option<f64>,
    pub temperature_2m_min: Option<f64>,
    pub precipitation_sum: Option<f64>,
    pub precipitation_hours: Option<f64>,
    pub precipitation_probability_max: Option<f64>,
    pub precipitation_probability_mean: Option<f64>,
    pub wind_speed_10m_max: Option<f64>,
    pub wind_gusts_10m_max: Option<f64>,
    pub wind_direction_10m_dominant: Option<f64>,
    pub shortwave_radiation_sum: Option<f64>,
    pub sunshine_duration: Option<f64>,
    pub uv_index_max: Option<f64>,
    pub et0_fao_evapotranspiration: Option<f64>,
}

/// One near-term hourly entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NextHour {
    pub time: Option<String>,
    pub precipitation_probability: Option<f64>,
    pub precipitation: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub wind_gusts_10m: Option<f64>,
    pub cloud_cover: Option<f64>,
}

/// Daily water balance band, ordered from driest to wettest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WaterBalanceClass {
    SevereDeficit,
    ModerateDeficit,
    MildDeficit,
    Neutral,
    Surplus,
}

impl WaterBalanceClass {
    pub fn label(self) -> &'static str {
        match self {
            WaterBalanceClass::SevereDeficit => "severe deficit",
            WaterBalanceClass::ModerateDeficit => "moderate deficit",
            WaterBalanceClass::MildDeficit => "mild deficit",
            WaterBalanceClass::Neutral => "neutral",
            WaterBalanceClass::Surplus => "surplus",
        }
    }
}

/// Agronomic indicators computed from the raw forecast.
///
/// `None` always means "unknown"; it is never a stand-in for `false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Derived {
    /// Precipitation sum minus reference evapotranspiration (mm)
    pub water_balance_mm: Option<f64>,
    pub water_balance_class: Option<WaterBalanceClass>,
    /// Rain probability and wind allow field operations over the next hours
    pub operation_window_ok: Option<bool>,
    /// Current temperature within 22 to 30 °C
    pub temperature_in_safe_range: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Meta {
    /// Timezone echoed by the forecast provider
    pub timezone: Option<String>,
    pub units: BTreeMap<String, String>,
}

/// The normalized weather result for one coordinate pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub today: Option<TodaySummary>,
    /// Up to six hourly entries starting at the current observation
    pub next_hours: Vec<NextHour>,
    pub derived: Derived,
    pub units: BTreeMap<String, String>,
    pub meta: Meta,
}
