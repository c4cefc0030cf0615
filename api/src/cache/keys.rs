//! Cache-key derivation.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strip diacritics and surrounding whitespace from a city query.
///
/// The text is decomposed (NFD) and every combining mark is dropped, so
/// "São Paulo" becomes "Sao Paulo". That covers all mark categories (Mn, Mc,
/// Me), not only nonspacing marks; Portuguese diacritics are all Mn, so city
/// names fold the same either way. Case is preserved; this form is also what
/// gets sent to the geocoder.
pub fn normalize_query(query: &str) -> String {
    query
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Cache key for a geocoding query: accent- and case-insensitive.
pub fn geocoding_key(query: &str) -> String {
    normalize_query(query).to_lowercase()
}

/// Cache key for a forecast lookup. Coordinates are used exactly as given.
pub fn weather_key(latitude: f64, longitude: f64) -> String {
    format!("{},{}", latitude, longitude)
}
