//! chatgw gateway entrypoint.
//!
//! - Loads config from the environment, fatal on invalid configuration.
//! - Builds the shared `AppState` (session registry, webhook dispatcher,
//!   pairing service, credential store).
//! - Runs periodic cleanup sweeps (§4.3, §4.5, §4.6) alongside the server.
//! - Serves `/api/v1/*` plus `/healthz`, `/readyz`, `/metrics`.

use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use chatgw_gateway::{app_state::AppState, config, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = match config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "config load failed");
            std::process::exit(1);
        }
    };
    let listen = cfg.listen_addr();

    let state = match AppState::new(cfg).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize application state");
            std::process::exit(1);
        }
    };

    spawn_sweep_loop(state.clone());

    let app = router::build_router(state.clone());

    tracing::info!(%listen, "chatgw-gateway starting");
    let listener = match tokio::net::TcpListener::bind(&listen).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %listen, "failed to bind");
            std::process::exit(1);
        }
    };

    let shutdown_state = state.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, draining");
            shutdown_state.shutdown().await;
        })
        .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}

fn spawn_sweep_loop(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            if state.is_draining() {
                break;
            }
            state.run_sweeps().await;
        }
    });
}
