//! Rendezvous server
//!
//! A minimal signaling relay: a host asks for a room and gets back a
//! short numeric code; a guest joins by that code; the server then
//! relays opaque `offer`/`answer`/`ice-candidate` frames between the
//! two until they've established a direct channel. No persistence, no
//! content inspection — the server never sees transfer data, only the
//! connection-setup handshake (spec.md §4.7).

mod handler;
mod protocol;
mod state;

use std::time::Duration;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::{RelayConfig, RelayState};

#[derive(Parser, Debug)]
#[command(name = "rendezvous-server", version, about = "Short-code pairing relay for transfer-core sessions")]
struct Args {
    /// Port to listen on.
    #[arg(short, long, default_value_t = 3000, env = "RENDEZVOUS_PORT")]
    port: u16,

    /// How long an unjoined room may sit before it's reaped.
    #[arg(long, default_value_t = 600, env = "ROOM_TTL_SECS")]
    room_ttl_secs: u64,

    /// How often the reaper sweeps for expired rooms.
    #[arg(long, default_value_t = 60, env = "CLEANUP_INTERVAL_SECS")]
    cleanup_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rendezvous_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let config = RelayConfig {
        port: args.port,
        room_ttl_secs: args.room_ttl_secs,
        cleanup_interval_secs: args.cleanup_interval_secs,
    };
    let state = RelayState::new(config);

    let cleanup_state = state.clone();
    let cleanup_interval = args.cleanup_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(cleanup_interval));
        loop {
            interval.tick().await;
            cleanup_state.cleanup_expired();
        }
    });

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", args.port);
    tracing::info!(addr = addr.as_str(), "rendezvous server starting");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");

    axum::serve(listener, app).await.expect("server error");
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handler::handle_websocket(socket, state))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "rendezvous-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn stats_handler(State(state): State<RelayState>) -> impl IntoResponse {
    Json(json!({
        "open_rooms": state.room_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_port() {
        let config = RelayConfig::default();
        assert_eq!(config.port, 3000);
    }
}
