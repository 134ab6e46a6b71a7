//! Resource server selling HTTP routes for Osmosis payments.
//!
//! Every configured route sits behind the x402 payment gate: unpaid
//! requests get `402 Payment Required`, paid ones are verified and settled
//! through the facilitator before the handler runs.
//!
//! # Endpoints
//!
//! - `GET /`        - Service info and the list of priced routes
//! - `GET /health`  - Health check
//! - `GET <route>`  - Each configured route (default: `/premium`)
//!
//! # Configuration
//!
//! Set the following environment variables:
//!
//! - `RECIPIENT_ADDRESS` - Address receiving payments (required to serve paid routes)
//! - `FACILITATOR_URL`   - Facilitator base URL (default: http://localhost:3000)
//! - `SITE_URL`          - Settlement-only fallback for the facilitator base URL
//! - `FACILITATOR_PATHS` - Endpoint layout: "root" or "api" (default: root)
//! - `ROUTES_FILE`       - JSON file mapping paths to route pricing
//! - `PUBLIC_BASE_URL`   - Origin advertised in resource URLs
//! - `BIND_ADDR`         - Listen address; else `HOST`:`PORT` (default: 0.0.0.0:4021)
//! - `LOG_LEVEL`         - Log filter when `RUST_LOG` is unset (default: info)

use std::env;

use axum::extract::{DefaultBodyLimit, OriginalUri, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use x402_osmosis::PaymentGate;
use x402_osmosis::chain::{FacilitatorPaths, ProcessEnv};
use x402_osmosis::v1_osmosis_exact::{FacilitatorClient, GateConfig, RouteConfig, RouteTable};

const DEFAULT_PRICE: &str = "1000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing: LOG_LEVEL is used if RUST_LOG is not set
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    let routes = load_routes()?;
    let paths: FacilitatorPaths = match env::var("FACILITATOR_PATHS") {
        Ok(value) => value.parse()?,
        Err(_) => FacilitatorPaths::default(),
    };
    let facilitator = FacilitatorClient::from_env(None, paths, &ProcessEnv);

    tracing::info!(
        verify_url = facilitator.verify_url(),
        settle_url = facilitator.settle_url(),
        routes = routes.len(),
        "Osmosis resource server starting"
    );

    let mut config = GateConfig::new(routes.clone(), facilitator);
    match env::var("RECIPIENT_ADDRESS") {
        Ok(recipient) if !recipient.is_empty() => config = config.with_recipient(recipient),
        _ => tracing::warn!("RECIPIENT_ADDRESS is not set; paid routes will answer 500"),
    }
    if let Ok(base_url) = env::var("PUBLIC_BASE_URL") {
        config = config.with_public_base_url(base_url);
    }

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler));
    for (path, _) in routes.iter() {
        app = app.route(path, get(resource_handler));
    }
    let app = app
        .layer(PaymentGate::new(config))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(routes);

    // BIND_ADDR takes precedence; fall back to HOST:PORT
    let bind_address = env::var("BIND_ADDR").unwrap_or_else(|_| {
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4021);
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        format!("{host}:{port}")
    });
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Listening on {bind_address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Reads the route table from `ROUTES_FILE`, or prices `/premium` alone.
fn load_routes() -> Result<RouteTable, Box<dyn std::error::Error>> {
    match env::var("ROUTES_FILE") {
        Ok(file) => {
            let json = std::fs::read_to_string(&file)?;
            let routes: RouteTable = serde_json::from_str(&json)?;
            tracing::info!(file = %file, "Loaded routes");
            Ok(routes)
        }
        Err(_) => Ok(RouteTable::from_routes([(
            "/premium",
            RouteConfig::new(DEFAULT_PRICE).with_description("Premium content"),
        )])?),
    }
}

/// Waits for a Ctrl-C signal to initiate graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

async fn root_handler(State(routes): State<RouteTable>) -> impl IntoResponse {
    let priced: serde_json::Map<String, serde_json::Value> = routes
        .iter()
        .map(|(path, route)| {
            (
                path.to_string(),
                serde_json::json!({
                    "price": route.price,
                    "network": route.network.as_deref().unwrap_or(x402_osmosis::OSMOSIS_TESTNET),
                }),
            )
        })
        .collect();
    Json(serde_json::json!({
        "service": "x402-osmosis-server",
        "version": env!("CARGO_PKG_VERSION"),
        "chain": "osmosis",
        "scheme": "exact",
        "routes": priced,
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Served only after the gate admitted the request.
async fn resource_handler(OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    Json(serde_json::json!({
        "content": "Paid content unlocked",
        "path": uri.path(),
    }))
}
