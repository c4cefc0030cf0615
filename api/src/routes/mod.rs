pub mod cities;
pub mod health;
pub mod weather;

use crate::cache::TtlCache;
use crate::services::open_meteo::OpenMeteoClient;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) cache: TtlCache,
    pub(crate) client: OpenMeteoClient,
}
