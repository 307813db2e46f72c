//! HTTP listing client
//!
//! `GET <base url><page params>` with bearer authentication. The outcome is
//! classified for the collector:
//! - 2xx with a JSON array body: the page items
//! - non-2xx: `FetchError::ServerError` carrying the status and a truncated body
//! - anything else (connect failure, timeout, unreadable or undecodable body):
//!   `FetchError::Transport`

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder};
use tracing::{debug, warn};

use crate::domain::{PageRequest, WorkItem};
use crate::infrastructure::config::ApiConfig;
use crate::sampling::{FetchError, PageSource};

/// Longest error body kept in a `ServerError`
pub const MAX_ERROR_BODY_CHARS: usize = 512;

const ACCEPT_VALUE: &str = "application/json, text/plain, */*";

#[derive(Debug, Clone)]
pub struct ListingClient {
    client: Client,
    base_url: String,
}

impl ListingClient {
    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        if !config.token.is_empty() {
            let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
                .map_err(|e| FetchError::Transport(format!("Invalid API token: {e}")))?;
            auth.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth);
        }

        let client = ClientBuilder::new()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
        })
    }

    pub fn url_for(&self, request: &PageRequest) -> String {
        format!("{}{}", self.base_url, request.params())
    }
}

#[async_trait]
impl PageSource for ListingClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<WorkItem>, FetchError> {
        let url = self.url_for(request);
        debug!("🌐 GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transport(describe(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(format!("Failed to read body: {}", describe(&e))))?;

        if !status.is_success() {
            warn!("❌ HTTP error {} at offset {}", status, request.offset);
            return Err(FetchError::ServerError {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| FetchError::Transport(format!("Undecodable listing body: {e}")))
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &body[..cut]),
        None => body.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ListingQuery;
    use chrono::NaiveDate;

    #[test]
    fn url_joins_base_and_params() {
        let config = ApiConfig {
            url: "https://tracker.example.org/api/".into(),
            ..ApiConfig::default()
        };
        let client = ListingClient::from_config(&config).unwrap();
        let query = ListingQuery {
            resource_path: "/workItems".into(),
            top_param: "$top".into(),
            skip_param: "$skip".into(),
            fields: "id".into(),
            page_size: 400,
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2021, 1, 2).unwrap(),
        };
        assert_eq!(
            client.url_for(&query.page(800)),
            "https://tracker.example.org/api/workItems?$top=400&$skip=800&fields=id&startDate=2021-01-01&endDate=2021-01-02"
        );
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé…");
    }

    #[test]
    fn rejects_token_with_control_characters() {
        let config = ApiConfig {
            token: "bad\ntoken".into(),
            ..ApiConfig::default()
        };
        assert!(matches!(
            ListingClient::from_config(&config),
            Err(FetchError::Transport(_))
        ));
    }
}
