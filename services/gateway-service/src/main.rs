mod app;
mod handlers;
mod models;
mod proxy;
mod state;

use powerwatch_common::{bind_listener, init_tracing, shutdown_signal};

use crate::state::{AppState, GatewayConfig};

#[tokio::main]
async fn main() {
    let _guards = init_tracing("gateway-service");

    let config = GatewayConfig::from_env();
    let state = match AppState::new(&config) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "gateway state init failed");
            std::process::exit(1);
        }
    };
    tracing::info!(
        port = config.port,
        api_base_url = %state.api_base_url,
        upstream_timeout_secs = config.upstream_timeout.as_secs(),
        "gateway starting"
    );

    let app = app::build_router(state);
    let listener = bind_listener(config.port).await.expect("bind listener");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("serve");
}
