mod auth;
mod chat;
mod comments;
mod config;
mod contacts;
mod db;
mod directory;
mod error;
mod notifications;
mod routes;
mod state;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use auth::verifier::JwtVerifier;
use config::{generate_config_template, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "redema_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "redema_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Redema realtime server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Load or generate the credential signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::verifier::load_or_generate_jwt_secret(&config.data_dir)?;
    let verifier = Arc::new(JwtVerifier::new(jwt_secret));

    // In-memory tables: connection registry and chat rooms.
    // Process-local by design; replicas would need external pub/sub fan-out.
    let connections = ws::ConnectionRegistry::new();
    let rooms = chat::RoomTable::new();

    // Bound room growth with the background sweeper
    chat::spawn_room_sweeper(rooms.clone(), config.chat());

    let app_state = state::AppState {
        db,
        connections,
        rooms,
        verifier,
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
