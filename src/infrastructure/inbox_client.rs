//! HTTP client for the Fiverr inbox API.
//!
//! Both endpoints rely on an already established browser session; the raw
//! `Cookie` header is attached to every request and nothing else is done
//! about authentication.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::{Client, Url};
use serde_json::Value;

use crate::domain::{ApiConfig, AppError, Result};

/// Query parameter carrying the contact cursor.
const CONTACTS_CURSOR_PARAM: &str = "older_than";
/// Query parameter carrying the message cursor.
const MESSAGES_CURSOR_PARAM: &str = "timestamp";

/// Read-only access to the paginated inbox endpoints.
///
/// Payloads are returned undecoded; normalization happens in the
/// application layer so fakes can hand back arbitrary JSON.
#[async_trait]
pub trait InboxApi: Send + Sync {
    /// `GET contacts[?older_than=<ms>]`
    async fn fetch_contacts(&self, older_than: Option<i64>) -> Result<Value>;

    /// `GET conversation/<identity>[?timestamp=<ms>]`
    async fn fetch_conversation(&self, identity: &str, timestamp: Option<i64>) -> Result<Value>;
}

/// `reqwest`-backed implementation of [`InboxApi`].
pub struct HttpInboxClient {
    client: Client,
    base_url: Url,
}

impl HttpInboxClient {
    /// Builds a client from the API configuration.
    ///
    /// # Errors
    /// Returns error if the base URL or cookie is invalid, or the client
    /// cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        match config.resolved_cookie() {
            Some(cookie) => {
                let value = HeaderValue::from_str(cookie.trim()).map_err(|e| AppError::Config {
                    message: format!("Invalid cookie header: {e}"),
                })?;
                headers.insert(COOKIE, value);
            }
            None => {
                tracing::debug!("No session cookie configured");
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .gzip(true)
            .build()
            .map_err(AppError::transport)?;

        Ok(Self { client, base_url })
    }

    /// Issues a GET and decodes the JSON body.
    async fn get_json(&self, url: Url) -> Result<Value> {
        tracing::debug!(%url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(AppError::transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await.map_err(AppError::transport)?;
        serde_json::from_str(&body).map_err(AppError::json_parse)
    }
}

#[async_trait]
impl InboxApi for HttpInboxClient {
    async fn fetch_contacts(&self, older_than: Option<i64>) -> Result<Value> {
        let url = contacts_url(&self.base_url, older_than)?;
        self.get_json(url).await
    }

    async fn fetch_conversation(&self, identity: &str, timestamp: Option<i64>) -> Result<Value> {
        let url = conversation_url(&self.base_url, identity, timestamp)?;
        self.get_json(url).await
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    Url::parse(raw.trim_end_matches('/')).map_err(|e| AppError::Config {
        message: format!("Invalid API base URL '{raw}': {e}"),
    })
}

fn with_segments(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| AppError::Config {
            message: format!("API base URL cannot carry a path: {base}"),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn contacts_url(base: &Url, older_than: Option<i64>) -> Result<Url> {
    let mut url = with_segments(base, &["contacts"])?;
    if let Some(cursor) = older_than {
        url.query_pairs_mut()
            .append_pair(CONTACTS_CURSOR_PARAM, &cursor.to_string());
    }
    Ok(url)
}

fn conversation_url(base: &Url, identity: &str, timestamp: Option<i64>) -> Result<Url> {
    let mut url = with_segments(base, &["conversation", identity])?;
    if let Some(cursor) = timestamp {
        url.query_pairs_mut()
            .append_pair(MESSAGES_CURSOR_PARAM, &cursor.to_string());
    }
    Ok(url)
}
