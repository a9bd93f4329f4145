use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Identifiers arrive as numbers from some backends and strings from others.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(value) => value.to_string(),
        RawId::Text(value) => value,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub struct RegisterRequest<'a> {
    pub username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    pub password: &'a str,
}

/// Session material returned by login, register and refresh.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Auth payload in either the flat `{access_token, user}` shape or wrapped
/// as `{message, data: {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Session>,
    #[serde(flatten)]
    pub flat: Session,
}

impl AuthResponse {
    pub fn session(&self) -> Session {
        let mut session = self.data.clone().unwrap_or_default();
        if session.access_token.is_none() {
            session.access_token = self.flat.access_token.clone();
        }
        if session.user.is_none() {
            session.user = self.flat.user.clone();
        }
        if session.refresh_token.is_none() {
            session.refresh_token = self.flat.refresh_token.clone();
        }
        session
    }

    pub fn access_token(&self) -> Option<String> {
        self.session()
            .access_token
            .filter(|token| !token.trim().is_empty())
    }

    pub fn user(&self) -> Option<User> {
        self.session().user
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    On,
    Off,
    Maintenance,
    Error,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            DeviceStatus::On => "on",
            DeviceStatus::Off => "off",
            DeviceStatus::Maintenance => "maintenance",
            DeviceStatus::Error => "error",
            DeviceStatus::Unknown => "unknown",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Device {
    pub id: i64,
    #[serde(default)]
    pub device_key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<DeviceStatus>,
    #[serde(default)]
    pub last_seen: Option<String>,
}

#[derive(Serialize)]
pub struct NewDevice<'a> {
    pub device_key: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

/// Acknowledgement bodies such as `{"message": "...", "device_id": 3}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub device_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Metric {
    pub id: i64,
    pub device_id: i64,
    pub timestamp: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Paginated<T> {
    #[serde(alias = "metrics")]
    pub items: Vec<T>,
    #[serde(alias = "total_items")]
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    #[serde(default, alias = "total_pages")]
    pub pages: u32,
}

impl<T> Paginated<T> {
    /// Page count, derived from `total` when the backend leaves `pages` out.
    pub fn total_pages(&self) -> u32 {
        if self.pages > 0 {
            self.pages
        } else {
            page_count(self.total, self.per_page)
        }
    }
}

/// `ceil(total / per_page)`; zero when either side is zero.
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let per_page = u64::from(per_page);
    u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX)
}

/// Error body shape shared by the gateway and the backend.
#[derive(Deserialize)]
pub(crate) struct MessageBody {
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
