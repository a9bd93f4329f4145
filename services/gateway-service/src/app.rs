use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_device, delete_device, device_data, get_device, healthz, list_devices, login, logout,
    profile, readyz, refresh, register, update_device,
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(profile))
        .route("/api/devices", get(list_devices).post(create_device))
        .route(
            "/api/devices/:id",
            get(get_device).post(update_device).delete(delete_device),
        )
        .route("/api/data/:device_id", get(device_data))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
