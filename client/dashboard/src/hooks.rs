//! Stateful wrappers around the gateway calls for each resource.
//!
//! Every hook tracks the last result, whether a call is in flight and the
//! last error message. Calls are neither de-duplicated nor cancelled: two
//! overlapping calls both run and whichever settles last owns the state.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::{ClientError, GatewayClient};
use crate::models::{
    Ack, AuthResponse, Device, LoginRequest, Metric, NewDevice, Paginated, RegisterRequest, User,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}

struct Tracked<T> {
    state: Mutex<HookState<T>>,
}

impl<T: Clone + Default> Tracked<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(HookState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HookState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) {
        let mut state = self.lock();
        state.loading = true;
        state.error = None;
    }

    /// Clears `loading`, then records either the error message or the update.
    fn settle<R>(
        &self,
        result: Result<R, ClientError>,
        apply: impl FnOnce(&mut T, &R),
    ) -> Result<R, ClientError> {
        let mut state = self.lock();
        state.loading = false;
        match &result {
            Ok(value) => apply(&mut state.data, value),
            Err(err) => state.error = Some(err.to_string()),
        }
        result
    }

    fn snapshot(&self) -> HookState<T> {
        self.lock().clone()
    }
}

pub struct AuthHook {
    client: GatewayClient,
    tracked: Tracked<Option<User>>,
}

impl AuthHook {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            tracked: Tracked::new(),
        }
    }

    pub fn state(&self) -> HookState<Option<User>> {
        self.tracked.snapshot()
    }

    pub fn user(&self) -> Option<User> {
        self.tracked.snapshot().data
    }

    fn store_session(&self, response: &AuthResponse) -> Result<(), ClientError> {
        if let Some(token) = response.access_token() {
            self.client.tokens().set(&token)?;
        }
        Ok(())
    }

    fn keep_user(user: &mut Option<User>, response: &AuthResponse) {
        *user = response.user();
    }

    pub async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        password: &str,
    ) -> Result<AuthResponse, ClientError> {
        self.tracked.begin();
        let result: Result<AuthResponse, ClientError> = async {
            let request = RegisterRequest {
                username,
                email,
                password,
            };
            let response = self.client.post(&["auth", "register"], &request).await?;
            self.store_session(&response)?;
            Ok(response)
        }
        .await;
        if result.is_ok() {
            tracing::info!(username, "registered");
        }
        self.tracked.settle(result, Self::keep_user)
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthResponse, ClientError> {
        self.tracked.begin();
        let result: Result<AuthResponse, ClientError> = async {
            let request = LoginRequest {
                username: identifier,
                password,
            };
            let response = self.client.post(&["auth", "login"], &request).await?;
            self.store_session(&response)?;
            Ok(response)
        }
        .await;
        self.tracked.settle(result, Self::keep_user)
    }

    /// The stored token is dropped only once the backend confirms the logout.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.tracked.begin();
        let result: Result<(), ClientError> = async {
            self.client
                .post_ignoring_body(&["auth", "logout"], &serde_json::json!({}))
                .await?;
            self.client.tokens().clear()?;
            Ok(())
        }
        .await;
        self.tracked.settle(result, |user, _| *user = None)
    }

    pub async fn profile(&self) -> Result<AuthResponse, ClientError> {
        self.tracked.begin();
        let result = self.client.get(&["auth", "me"], &[]).await;
        self.tracked.settle(result, Self::keep_user)
    }

    /// Exchanges the stored token for a fresh one. Never scheduled
    /// automatically; callers decide when a refresh is due.
    pub async fn refresh(&self) -> Result<AuthResponse, ClientError> {
        self.tracked.begin();
        let result: Result<AuthResponse, ClientError> = async {
            let response = self
                .client
                .post(&["auth", "refresh"], &serde_json::json!({}))
                .await?;
            self.store_session(&response)?;
            Ok(response)
        }
        .await;
        self.tracked.settle(result, |user, response| {
            if let Some(fresh) = response.user() {
                *user = Some(fresh);
            }
        })
    }
}

pub struct DevicesHook {
    client: GatewayClient,
    tracked: Tracked<Vec<Device>>,
}

impl DevicesHook {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            tracked: Tracked::new(),
        }
    }

    pub fn state(&self) -> HookState<Vec<Device>> {
        self.tracked.snapshot()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.tracked.snapshot().data
    }

    pub async fn get_devices(&self) -> Result<Vec<Device>, ClientError> {
        self.tracked.begin();
        let result = self.client.get(&["devices"], &[]).await;
        self.tracked
            .settle(result, |devices, fetched: &Vec<Device>| *devices = fetched.clone())
    }

    /// Registers a device, then re-fetches the list so it includes it.
    pub async fn add_device(
        &self,
        device_key: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Ack, ClientError> {
        self.tracked.begin();
        let result: Result<Ack, ClientError> = async {
            let request = NewDevice {
                device_key,
                password,
                name,
            };
            let ack: Option<Ack> = self.client.post(&["devices"], &request).await?;
            self.get_devices().await?;
            Ok(ack.unwrap_or_default())
        }
        .await;
        self.tracked.settle(result, |_, _| {})
    }

    pub async fn get_device(&self, id: i64) -> Result<Device, ClientError> {
        self.tracked.begin();
        let id = id.to_string();
        let result = self.client.get(&["devices", id.as_str()], &[]).await;
        self.tracked.settle(result, |_, _| {})
    }

    pub async fn update_device(
        &self,
        id: i64,
        changes: &serde_json::Value,
    ) -> Result<Ack, ClientError> {
        self.tracked.begin();
        let result: Result<Ack, ClientError> = async {
            let id = id.to_string();
            let ack: Option<Ack> = self.client.post(&["devices", id.as_str()], changes).await?;
            self.get_devices().await?;
            Ok(ack.unwrap_or_default())
        }
        .await;
        self.tracked.settle(result, |_, _| {})
    }

    pub async fn remove_device(&self, id: i64) -> Result<Ack, ClientError> {
        self.tracked.begin();
        let result: Result<Ack, ClientError> = async {
            let id = id.to_string();
            let ack: Option<Ack> = self.client.delete(&["devices", id.as_str()]).await?;
            self.get_devices().await?;
            Ok(ack.unwrap_or_default())
        }
        .await;
        self.tracked.settle(result, |_, _| {})
    }
}

pub struct DeviceDataHook {
    client: GatewayClient,
    tracked: Tracked<Option<Paginated<Metric>>>,
}

impl DeviceDataHook {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            tracked: Tracked::new(),
        }
    }

    pub fn state(&self) -> HookState<Option<Paginated<Metric>>> {
        self.tracked.snapshot()
    }

    pub fn data(&self) -> Option<Paginated<Metric>> {
        self.tracked.snapshot().data
    }

    pub async fn get_device_data(
        &self,
        device_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Paginated<Metric>, ClientError> {
        self.tracked.begin();
        let device_id = device_id.to_string();
        let query = [("page", page.to_string()), ("per_page", per_page.to_string())];
        let result = self
            .client
            .get(&["data", device_id.as_str()], &query)
            .await;
        self.tracked
            .settle(result, |data, fetched: &Paginated<Metric>| *data = Some(fetched.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::SocketAddr,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use axum::{
        extract::{Path, Query, State},
        http::{header, HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
    use serde::Deserialize;
    use serde_json::{json, Value};
    use tokio::{net::TcpListener, sync::Notify};

    use super::*;
    use crate::models::page_count;
    use crate::token::{MemoryTokenStore, TokenProvider};

    const TOKEN: &str = "tok-abc";

    #[derive(Clone, Default)]
    struct Backend {
        devices: Arc<Mutex<Vec<Device>>>,
        seen_authorization: Arc<Mutex<Vec<Option<String>>>>,
        release: Arc<Notify>,
    }

    impl Backend {
        fn authorized(&self, headers: &HeaderMap) -> bool {
            let value = headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let expected = format!("Bearer {TOKEN}");
            let ok = value.as_deref() == Some(expected.as_str());
            self.seen_authorization.lock().expect("lock").push(value);
            ok
        }
    }

    fn unauthorized() -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthorized" })),
        )
            .into_response()
    }

    #[derive(Deserialize)]
    struct Paging {
        page: u32,
        per_page: u32,
    }

    async fn login(Json(body): Json<Value>) -> Response {
        if body["password"] == "pw" {
            Json(json!({
                "access_token": TOKEN,
                "user": { "id": 1, "username": body["username"], "email": "u@example.com" }
            }))
            .into_response()
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Invalid username or password" })),
            )
                .into_response()
        }
    }

    async fn refresh(State(backend): State<Backend>, headers: HeaderMap) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        Json(json!({ "message": "ok", "data": { "access_token": "tok-fresh" } })).into_response()
    }

    async fn logout(State(backend): State<Backend>, headers: HeaderMap) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        // Plain-text acknowledgement, not JSON.
        (StatusCode::OK, "ok").into_response()
    }

    async fn list_devices(State(backend): State<Backend>, headers: HeaderMap) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        Json(backend.devices.lock().expect("lock").clone()).into_response()
    }

    async fn create_device(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        let mut devices = backend.devices.lock().expect("lock");
        let id = devices.len() as i64 + 1;
        devices.push(Device {
            id,
            device_key: body["device_key"].as_str().map(str::to_string),
            name: None,
            status: None,
            last_seen: None,
        });
        (
            StatusCode::CREATED,
            Json(json!({ "message": "Device registered successfully", "device_id": id })),
        )
            .into_response()
    }

    async fn device_detail(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        let devices = backend.devices.lock().expect("lock");
        match devices.iter().find(|device| device.id == id) {
            Some(device) => Json(device.clone()).into_response(),
            None => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "Device not found" })),
            )
                .into_response(),
        }
    }

    async fn update_device(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Path(id): Path<i64>,
        Json(body): Json<Value>,
    ) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        let mut devices = backend.devices.lock().expect("lock");
        if let Some(device) = devices.iter_mut().find(|device| device.id == id) {
            device.name = body["name"].as_str().map(str::to_string);
        }
        Json(json!({ "message": "Device updated" })).into_response()
    }

    async fn delete_device(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Path(id): Path<i64>,
    ) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        backend
            .devices
            .lock()
            .expect("lock")
            .retain(|device| device.id != id);
        StatusCode::NO_CONTENT.into_response()
    }

    async fn device_data(
        State(backend): State<Backend>,
        headers: HeaderMap,
        Path(device_id): Path<i64>,
        Query(paging): Query<Paging>,
    ) -> Response {
        if !backend.authorized(&headers) {
            return unauthorized();
        }
        if device_id == 99 {
            // Held until the test releases it, to observe the loading flag.
            backend.release.notified().await;
        }
        let all: Vec<Metric> = (1..=25)
            .map(|n| Metric {
                id: n,
                device_id,
                timestamp: format!("2024-05-01T10:{n:02}:00Z"),
                value: n as f64,
            })
            .collect();
        let start = ((paging.page.max(1) - 1) * paging.per_page) as usize;
        let items: Vec<Metric> = all
            .iter()
            .skip(start)
            .take(paging.per_page as usize)
            .cloned()
            .collect();
        Json(Paginated {
            items,
            total: all.len() as u64,
            page: paging.page,
            per_page: paging.per_page,
            pages: page_count(all.len() as u64, paging.per_page),
        })
        .into_response()
    }

    async fn spawn_gateway(backend: Backend) -> SocketAddr {
        let router = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/logout", post(logout))
            .route("/api/devices", get(list_devices).post(create_device))
            .route(
                "/api/devices/:id",
                get(device_detail).post(update_device).delete(delete_device),
            )
            .route("/api/data/:device_id", get(device_data))
            .with_state(backend);
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        addr
    }

    async fn client_for(backend: Backend) -> (GatewayClient, Arc<MemoryTokenStore>) {
        let addr = spawn_gateway(backend).await;
        let tokens = Arc::new(MemoryTokenStore::new());
        let client = GatewayClient::new(
            &format!("http://{addr}"),
            Duration::from_secs(5),
            tokens.clone(),
        )
        .expect("client");
        (client, tokens)
    }

    #[tokio::test]
    async fn login_stores_token_and_devices_use_it() {
        let backend = Backend::default();
        let (client, tokens) = client_for(backend.clone()).await;
        let auth = AuthHook::new(client.clone());
        let devices = DevicesHook::new(client);

        let response = auth.login("thandi", "pw").await.expect("login");
        assert_eq!(response.access_token().as_deref(), Some(TOKEN));
        assert_eq!(tokens.get().expect("get").as_deref(), Some(TOKEN));
        assert_eq!(auth.user().map(|user| user.username), Some("thandi".to_string()));

        devices.get_devices().await.expect("devices");
        let seen = backend.seen_authorization.lock().expect("lock").clone();
        assert_eq!(seen.last().cloned().flatten(), Some(format!("Bearer {TOKEN}")));
        let state = devices.state();
        assert!(!state.loading);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn failed_login_records_message_and_keeps_no_token() {
        let (client, tokens) = client_for(Backend::default()).await;
        let auth = AuthHook::new(client);

        let err = auth.login("thandi", "wrong").await.expect_err("rejected");
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        let state = auth.state();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Invalid username or password"));
        assert_eq!(state.data, None);
        assert_eq!(tokens.get().expect("get"), None);
    }

    #[tokio::test]
    async fn created_device_appears_after_refetch() {
        let (client, tokens) = client_for(Backend::default()).await;
        tokens.set(TOKEN).expect("set");
        let devices = DevicesHook::new(client);

        let ack = devices.add_device("abc", "pw", None).await.expect("add");
        assert_eq!(ack.device_id, Some(1));
        let listed = devices.devices();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].device_key.as_deref(), Some("abc"));
        assert!(!devices.state().loading);
    }

    #[tokio::test]
    async fn device_detail_update_and_removal() {
        let (client, tokens) = client_for(Backend::default()).await;
        tokens.set(TOKEN).expect("set");
        let devices = DevicesHook::new(client);
        devices.add_device("abc", "pw", None).await.expect("add");
        devices.add_device("def", "pw", None).await.expect("add");

        let ack = devices
            .update_device(1, &json!({ "name": "Geyser" }))
            .await
            .expect("update");
        assert_eq!(ack.message.as_deref(), Some("Device updated"));
        let device = devices.get_device(1).await.expect("detail");
        assert_eq!(device.name.as_deref(), Some("Geyser"));

        let ack = devices.remove_device(1).await.expect("remove");
        assert_eq!(ack, Ack::default());
        let remaining: Vec<i64> = devices.devices().iter().map(|device| device.id).collect();
        assert_eq!(remaining, vec![2]);

        let err = devices.get_device(1).await.expect_err("gone");
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(devices.state().error.as_deref(), Some("Device not found"));
        // A failed detail fetch leaves the last good list untouched.
        assert_eq!(devices.devices().len(), 1);
    }

    #[tokio::test]
    async fn missing_token_surfaces_unauthorized() {
        let (client, _tokens) = client_for(Backend::default()).await;
        let devices = DevicesHook::new(client);

        let err = devices.get_devices().await.expect_err("unauthorized");
        assert_eq!(err.to_string(), "Unauthorized");
        assert_eq!(devices.state().error.as_deref(), Some("Unauthorized"));
        assert!(devices.devices().is_empty());
    }

    #[tokio::test]
    async fn refresh_overwrites_and_logout_clears_token() {
        let (client, tokens) = client_for(Backend::default()).await;
        tokens.set(TOKEN).expect("set");
        let auth = AuthHook::new(client);

        auth.refresh().await.expect("refresh");
        assert_eq!(tokens.get().expect("get").as_deref(), Some("tok-fresh"));

        // The backend only knows the first token, so this logout is refused
        // and the stored token must survive.
        auth.logout().await.expect_err("stale token");
        assert_eq!(tokens.get().expect("get").as_deref(), Some("tok-fresh"));

        tokens.set(TOKEN).expect("set");
        auth.logout().await.expect("logout");
        assert_eq!(tokens.get().expect("get"), None);
        assert_eq!(auth.user(), None);
    }

    #[tokio::test]
    async fn device_data_returns_requested_slice() {
        let (client, tokens) = client_for(Backend::default()).await;
        tokens.set(TOKEN).expect("set");
        let data = DeviceDataHook::new(client);

        let page = data.get_device_data(7, 3, 10).await.expect("page 3");
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages(), 3);
        let ids: Vec<i64> = page.items.iter().map(|metric| metric.id).collect();
        assert_eq!(ids, vec![21, 22, 23, 24, 25]);
        assert!(page.items.iter().all(|metric| metric.device_id == 7));
        assert_eq!(data.data(), Some(page));
    }

    #[tokio::test]
    async fn loading_flag_is_set_while_call_is_in_flight() {
        let backend = Backend::default();
        let (client, tokens) = client_for(backend.clone()).await;
        tokens.set(TOKEN).expect("set");
        let data = Arc::new(DeviceDataHook::new(client));

        let call = {
            let data = data.clone();
            tokio::spawn(async move { data.get_device_data(99, 1, 10).await })
        };
        let mut observed = false;
        for _ in 0..50 {
            if data.state().loading {
                observed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(observed, "loading never became true");

        backend.release.notify_one();
        call.await.expect("join").expect("data");
        assert!(!data.state().loading);
        assert_eq!(data.data().map(|page| page.items.len()), Some(10));
    }
}
