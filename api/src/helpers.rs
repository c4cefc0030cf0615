//! Shared helpers for reading fields out of raw Open-Meteo JSON.
//!
//! Every accessor is lenient: a missing key, a `null`, a non-array where an
//! array is expected, an out-of-range index, or a value of the wrong type all
//! yield `None`. One malformed field never fails the surrounding payload.
//!
//! Open-Meteo returns daily and hourly data as parallel arrays indexed by the
//! group's `time` array, so most reads are "array `key` of group, at `idx`".

use serde_json::Value;

/// Read a numeric field of a JSON object.
pub(crate) fn num_field(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(Value::as_f64)
}

/// Read a string field of a JSON object.
pub(crate) fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Read element `idx` of the numeric array `key` inside a parallel-array group.
pub(crate) fn num_at(group: &Value, key: &str, idx: usize) -> Option<f64> {
    group
        .get(key)
        .and_then(Value::as_array)
        .and_then(|arr| arr.get(idx))
        .and_then(Value::as_f64)
}

/// First element of the numeric array `key`, the single-day read for `daily`.
pub(crate) fn first_num(group: &Value, key: &str) -> Option<f64> {
    num_at(group, key, 0)
}

/// The `time` array of a group as optional strings, preserving positions.
///
/// Returns an empty vector when `time` is missing or not an array.
pub(crate) fn time_axis(group: &Value) -> Vec<Option<&str>> {
    group
        .get("time")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(Value::as_str).collect())
        .unwrap_or_default()
}
