use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};

use crate::models::DataQuery;
use crate::proxy::{forward, require_authorization, Forward, ServiceError};
use crate::state::AppState;

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

pub async fn readyz() -> StatusCode {
    StatusCode::OK
}

fn relay(result: Result<Response, ServiceError>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn forward_authorized(
    state: &AppState,
    headers: &HeaderMap,
    request: Forward<'_>,
) -> Response {
    // Missing credentials never reach the backend.
    let authorization = match require_authorization(headers) {
        Ok(value) => value,
        Err(err) => {
            tracing::info!(segments = ?request.segments, "rejected request without authorization");
            return err.into_response();
        }
    };
    relay(forward(state, request.authorization(authorization)).await)
}

pub async fn login(State(state): State<AppState>, body: Bytes) -> Response {
    relay(forward(&state, Forward::new(Method::POST, &["auth", "login"]).body(body)).await)
}

pub async fn register(State(state): State<AppState>, body: Bytes) -> Response {
    relay(forward(&state, Forward::new(Method::POST, &["auth", "register"]).body(body)).await)
}

pub async fn refresh(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = Forward::new(Method::POST, &["auth", "refresh"]).body(body);
    forward_authorized(&state, &headers, request).await
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = Forward::new(Method::POST, &["auth", "logout"]).body(body);
    forward_authorized(&state, &headers, request).await
}

pub async fn profile(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request = Forward::new(Method::GET, &["auth", "me"]);
    forward_authorized(&state, &headers, request).await
}

pub async fn list_devices(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let request = Forward::new(Method::GET, &["devices"]);
    forward_authorized(&state, &headers, request).await
}

pub async fn create_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = Forward::new(Method::POST, &["devices"]).body(body);
    forward_authorized(&state, &headers, request).await
}

pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let segments = ["devices", id.as_str()];
    let request = Forward::new(Method::GET, &segments);
    forward_authorized(&state, &headers, request).await
}

pub async fn update_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let segments = ["devices", id.as_str()];
    let request = Forward::new(Method::POST, &segments).body(body);
    forward_authorized(&state, &headers, request).await
}

pub async fn delete_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let segments = ["devices", id.as_str()];
    let request = Forward::new(Method::DELETE, &segments);
    forward_authorized(&state, &headers, request).await
}

pub async fn device_data(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<DataQuery>,
    headers: HeaderMap,
) -> Response {
    let segments = ["data", device_id.as_str()];
    let request = Forward::new(Method::GET, &segments).query(params.into_pairs());
    forward_authorized(&state, &headers, request).await
}
