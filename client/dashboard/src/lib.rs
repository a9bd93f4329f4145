//! Client side of the Powerwatch dashboard: session token storage, the
//! gateway HTTP client, per-resource hooks and terminal views.

pub mod api;
pub mod config;
pub mod hooks;
pub mod models;
pub mod pager;
pub mod token;
pub mod views;

pub use api::{ClientError, GatewayClient};
pub use hooks::{AuthHook, DeviceDataHook, DevicesHook, HookState};
pub use pager::MetricsPager;
pub use token::{FileTokenStore, MemoryTokenStore, TokenProvider};
