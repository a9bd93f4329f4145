use std::{sync::Arc, time::Duration};

use reqwest::{header, Client, Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::models::MessageBody;
use crate::token::{TokenProvider, TokenStoreError};

#[derive(Debug, Error)]
pub enum ClientError {
    /// The gateway or backend answered with a non-success status.
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(err) => err.status(),
            _ => None,
        }
    }
}

/// Derives the message shown to the user for a rejected call.
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    let parsed = serde_json::from_slice::<MessageBody>(body).ok();
    parsed
        .and_then(|body| body.message.or(body.error))
        .filter(|message| !message.trim().is_empty())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()))
}

/// HTTP client for the gateway's `/api` routes.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl GatewayClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ClientError::InvalidUrl(base_url.to_string()))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            tokens,
        })
    }

    pub fn tokens(&self) -> &Arc<dyn TokenProvider> {
        &self.tokens
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        self.send(Method::GET, segments, query, None::<&()>).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(Method::POST, segments, &[], Some(body)).await
    }

    /// POST where only the status matters; any 2xx body is discarded.
    pub async fn post_ignoring_body<B: Serialize + ?Sized>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<(), ClientError> {
        self.execute(Method::POST, segments, &[], Some(body))
            .await
            .map(drop)
    }

    pub async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ClientError> {
        self.send(Method::DELETE, segments, &[], None::<&()>).await
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let bytes = self.execute(method, segments, query, body).await?;
        // Some endpoints answer with an empty body; decode that as JSON null.
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(payload).map_err(|err| ClientError::Decode(err.to_string()))
    }

    /// One call, no retry. The stored token, when present, is sent as a bearer
    /// credential; without one the gateway decides whether the route is open.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<Vec<u8>, ClientError> {
        let url = self.url(segments);
        let mut request = self.http.request(method.clone(), url.clone());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = self.tokens.get()? {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            tracing::warn!(error = %err, %method, url = %url, "gateway unreachable");
            ClientError::Transport(err)
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let message = error_message(status, &bytes);
            tracing::warn!(status = status.as_u16(), %method, url = %url, message = %message, "gateway rejected request");
            return Err(ClientError::Api { status, message });
        }

        tracing::debug!(status = status.as_u16(), %method, url = %url, "gateway ok");
        Ok(bytes.to_vec())
    }
}
