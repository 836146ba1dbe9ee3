//! Tempo detection HTTP server

use tempometer::server::{router, AppState};

#[tokio::main]
async fn main() {
    env_logger::init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    log::info!("Tempometer {} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    log::info!("POST /detect-bpm  streaming tempo detection");
    log::info!("GET  /health      readiness probe");
    log::info!("POST /reset       clear detector state");
    log::info!("GET  /status      detector introspection");

    let app = router(AppState::new());

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(error) => {
            log::error!("Failed to bind {}: {}", addr, error);
            std::process::exit(1);
        }
    };
    if let Err(error) = axum::serve(listener, app).await {
        log::error!("Server error: {}", error);
        std::process::exit(1);
    }
}
