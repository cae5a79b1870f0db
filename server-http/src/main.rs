use server_http::routes;
use server_http::state::AppState;
use shared::config::Config;
use tracing::{Level, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Keygrid node...");

    // Load environment variables from .env file (if exists)
    match dotenvy::dotenv() {
        Ok(_) => info!("Loaded environment variables from .env file"),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    // Load configuration from environment variables
    let config = Config::from_env();

    // Wire the node state
    let (state, coordinator) = AppState::new(&config).expect("failed to initialize node state");

    // Peer invalidation listener
    let peer_addr = format!("{}:{}", config.host, config.peer_port);
    let peer_listener = tokio::net::TcpListener::bind(&peer_addr)
        .await
        .expect("failed to bind peer listener");
    info!("Peer listener on tcp://{}", peer_addr);
    tokio::spawn(peer_link::server::serve(peer_listener, coordinator));

    // Build router
    let router = routes::build_router(state);

    // Start server
    let http_addr = format!("{}:{}", config.host, config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await.unwrap();

    info!("HTTP server listening on http://{}", http_addr);
    info!(region = %config.region, peers = ?config.peers, "invalidation fan-out configured");

    // Graceful shutdown handler
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
