use serde::{Deserialize, Serialize};

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
pub const NOT_FOUND_MESSAGE: &str = "Not found";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub const DEFAULT_PAGE: &str = "1";
pub const DEFAULT_PER_PAGE: &str = "10";

#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: &'static str,
}

/// Telemetry paging parameters, forwarded as the raw strings the caller sent.
#[derive(Deserialize, Default)]
pub struct DataQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

impl DataQuery {
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        let page = self
            .page
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PAGE.to_string());
        let per_page = self
            .per_page
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_PER_PAGE.to_string());
        vec![("page", page), ("per_page", per_page)]
    }
}
