pub mod forecast;
pub mod geocoding;
pub mod open_meteo;
