//! HTTP client for the contact book REST API.
//!
//! This module provides the `ApiClient` struct, the reqwest-backed
//! implementation of [`RemoteContactService`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Contact, ContactFields};

use super::{ApiError, RemoteContactService};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the contact book backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: None,
        })
    }

    /// Create a client wired from persisted configuration.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let mut client = Self::new(config.base_url.clone())?;
        if let Some(ref token) = config.api_token {
            client.set_token(token.clone());
        }
        Ok(client)
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Issue a request, retrying on 429 with exponential backoff.
    /// Returns the successful response; every failure path maps to `ApiError`.
    async fn request<B: Serialize + Sync>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.client.request(method.clone(), url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(ref token) = self.token {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;

            if response.status().is_success() {
                return Ok(response);
            }

            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body_text));
        }
    }
}

#[async_trait]
impl RemoteContactService for ApiClient {
    async fn list(&self, query: Option<String>) -> Result<Vec<Contact>, ApiError> {
        let url = self.endpoint("contacts");
        let search = query.as_deref().map(str::trim).filter(|q| !q.is_empty());
        let params: Vec<(&str, &str)> = match search {
            Some(q) => vec![("search", q)],
            None => Vec::new(),
        };

        let response = self
            .request(Method::GET, &url, &params, None::<&ContactFields>)
            .await?;

        let contacts: Vec<Contact> = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("malformed contact list: {}", e)))?;
        debug!(count = contacts.len(), "Fetched contact list");
        Ok(contacts)
    }

    async fn create(&self, fields: ContactFields) -> Result<Contact, ApiError> {
        let url = self.endpoint("contacts");
        let response = self
            .request(Method::POST, &url, &[], Some(&fields))
            .await?;

        let created: Contact = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("malformed created contact: {}", e)))?;

        if !created.is_persisted() {
            // A record without a server id is unusable downstream
            return Err(ApiError::InvalidResponse(
                "created contact has no server-assigned id".to_string(),
            ));
        }

        debug!(id = created.id, "Contact created remotely");
        Ok(created)
    }

    async fn update(&self, id: i64, fields: ContactFields) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("contacts/{}", id));
        self.request(Method::PUT, &url, &[], Some(&fields)).await?;
        debug!(id, "Contact updated remotely");
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("contacts/{}", id));
        self.request(Method::DELETE, &url, &[], None::<&ContactFields>)
            .await?;
        debug!(id, "Contact deleted remotely");
        Ok(())
    }
}
