use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::models::{
    ErrorResponse, INTERNAL_ERROR_MESSAGE, NOT_FOUND_MESSAGE, UNAUTHORIZED_MESSAGE,
};
use crate::state::AppState;

pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ServiceError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorResponse {
                message: UNAUTHORIZED_MESSAGE,
            },
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse {
                message: NOT_FOUND_MESSAGE,
            },
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                message: INTERNAL_ERROR_MESSAGE,
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// One outbound call to the backend.
pub struct Forward<'a> {
    pub method: Method,
    pub segments: &'a [&'a str],
    pub query: Vec<(&'static str, String)>,
    pub authorization: Option<HeaderValue>,
    pub body: Option<Bytes>,
}

impl<'a> Forward<'a> {
    pub fn new(method: Method, segments: &'a [&'a str]) -> Self {
        Self {
            method,
            segments,
            query: Vec::new(),
            authorization: None,
            body: None,
        }
    }

    pub fn authorization(mut self, value: HeaderValue) -> Self {
        self.authorization = Some(value);
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query = pairs;
        self
    }
}

/// Returns the caller's Authorization header, or 401 when it is missing or blank.
pub fn require_authorization(headers: &HeaderMap) -> Result<HeaderValue, ServiceError> {
    match headers.get(header::AUTHORIZATION) {
        Some(value) if !value.as_bytes().trim_ascii().is_empty() => Ok(value.clone()),
        _ => Err(ServiceError::unauthorized()),
    }
}

/// `.` and `..` would be resolved away when joined onto the backend URL,
/// landing the call on a different backend route.
fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

/// Sends the request once and relays the backend's status, content type and body.
///
/// A backend error status is relayed like any other response. Only failures to
/// reach the backend or read its body become a generic 500.
pub async fn forward(state: &AppState, request: Forward<'_>) -> Result<Response, ServiceError> {
    if request.segments.iter().any(|segment| is_dot_segment(segment)) {
        tracing::info!(segments = ?request.segments, "rejected dot path segment");
        return Err(ServiceError::not_found());
    }
    let url = state.upstream_url(request.segments);
    let method = request.method.clone();

    let mut outbound = state
        .client
        .request(request.method, url.clone())
        .header(header::CONTENT_TYPE, "application/json");
    if !request.query.is_empty() {
        outbound = outbound.query(&request.query);
    }
    if let Some(authorization) = request.authorization {
        outbound = outbound.header(header::AUTHORIZATION, authorization);
    }
    if let Some(body) = request.body {
        outbound = outbound.body(body);
    }

    let upstream = outbound.send().await.map_err(|err| {
        tracing::error!(error = %err, %method, url = %url, "backend request failed");
        ServiceError::internal()
    })?;

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = upstream.bytes().await.map_err(|err| {
        tracing::error!(error = %err, %method, url = %url, "backend body read failed");
        ServiceError::internal()
    })?;

    if status.is_success() {
        tracing::debug!(status = status.as_u16(), %method, url = %url, "backend ok");
    } else {
        tracing::warn!(status = status.as_u16(), %method, url = %url, "backend rejected request");
    }

    let mut response = axum::http::Response::builder().status(status);
    if let Some(content_type) = content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response.body(Body::from(bytes)).map_err(|err| {
        tracing::error!(error = %err, "relay response build failed");
        ServiceError::internal()
    })
}
