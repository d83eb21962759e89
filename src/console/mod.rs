//! Operator console: Axum JSON API over the live feed, selection,
//! search, wallet and trading.
//!
//! CORS enabled for local front-ends. No authentication; bind it to a
//! trusted interface.

pub mod routes;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, ConsoleState};

/// Start the console web server.
///
/// This spawns a background task and returns its handle.
pub fn spawn_console(state: AppState, port: u16) -> tokio::task::JoinHandle<()> {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(port, error = %e, "Failed to bind console port");
                return;
            }
        };
        info!(port, "Console listening on http://localhost:{port}");

        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Console server error");
        }
    })
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/feed", get(routes::get_feed))
        .route("/api/selected", get(routes::get_selected).post(routes::post_selected))
        .route("/api/search", get(routes::get_search))
        .route("/api/wallet", axum::routing::post(routes::post_wallet))
        .route("/api/holdings", get(routes::get_holdings))
        .route("/api/buy", axum::routing::post(routes::post_buy))
        .route("/api/sell", axum::routing::post(routes::post_sell))
        .route("/api/notices", get(routes::get_notices))
        .route("/api/stats", get(routes::get_stats))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
