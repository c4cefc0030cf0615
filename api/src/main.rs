// Clima API v0.1
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod cache;
mod config;
mod errors;
mod helpers;
mod models;
mod routes;
mod services;

use cache::TtlCache;
use config::AppConfig;
use routes::AppState;
use services::open_meteo::OpenMeteoClient;

/// Clima API OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Clima API",
        version = "0.1.0",
        description = "Agronomic weather API for Brazilian cities. \
            Geocodes city names and fetches today's forecast from Open-Meteo, \
            caching both, and derives field indicators: daily water balance, \
            safe temperature range and a short-term operation window.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Cities", description = "City search"),
        (name = "Weather", description = "Weather snapshot with derived indicators"),
    ),
    paths(
        routes::health::health_check,
        routes::cities::list_cities,
        routes::weather::get_city_weather,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::weather::WeatherResponse,
            routes::weather::WeatherStatus,
            routes::weather::WeatherData,
            models::City,
            models::WeatherSnapshot,
            models::CurrentConditions,
            models::TodaySummary,
            models::NextHour,
            models::Derived,
            models::WaterBalanceClass,
            models::Meta,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clima_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    init_tracing(config.as_ref().is_ok_and(|c| c.json_logs));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let cache = TtlCache::from_config(&config.cache);
    tracing::info!("Cache backend: {}", cache.backend_name());

    let app_state = AppState {
        cache,
        client: OpenMeteoClient::new(&config.forecast_url, &config.geocoding_url),
    };

    // CORS: read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/cities", get(routes::cities::list_cities))
        .route("/api/v1/weather", get(routes::weather::get_city_weather))
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server terminated unexpectedly: {}", e);
        std::process::exit(1);
    }
}
