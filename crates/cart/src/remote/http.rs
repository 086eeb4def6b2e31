//! HTTP client for the storefront cart API.
//!
//! ```text
//! GET    {base}/api/carts/{identity}
//! PUT    {base}/api/carts/{identity}/lines/{line_key}
//! DELETE {base}/api/carts/{identity}/lines/{line_key}
//! DELETE {base}/api/carts/{identity}
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use shopfront_core::{CartIdentity, CartItem, CartResponse, LineKey};

use super::{RemoteCartStore, RemoteError};
use crate::config::CartSyncConfig;

/// Maximum number of body characters kept in errors and logs.
const BODY_PREVIEW_CHARS: usize = 500;

/// Client for the storefront cart API.
///
/// Cheaply cloneable; clones share the connection pool.
#[derive(Clone)]
pub struct HttpCartClient {
    inner: Arc<HttpCartClientInner>,
}

struct HttpCartClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCartClient {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(HttpCartClientInner { client, base_url }),
        })
    }

    /// Create a client from the engine configuration.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &CartSyncConfig) -> Result<Self, RemoteError> {
        Self::new(config.api_url.clone(), config.http_timeout)
    }

    /// Build `{base}/api/carts/{identity}[/lines/{line_key}]`.
    fn cart_url(
        &self,
        identity: &CartIdentity,
        line_key: Option<LineKey>,
    ) -> Result<Url, RemoteError> {
        let identity_key = identity.storage_key();
        let mut url = self.inner.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| RemoteError::InvalidUrl(self.inner.base_url.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["api", "carts", identity_key.as_str()]);
            if let Some(key) = line_key {
                let line_key = key.to_string();
                segments.extend(["lines", line_key.as_str()]);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .header("Accept", "application/json")
    }

    /// Send a request and map non-success responses to errors.
    async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview = body.chars().take(BODY_PREVIEW_CHARS).collect::<String>();
            tracing::error!(
                status = %status,
                body = %preview,
                "Cart API returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }

        Ok(response)
    }
}

impl RemoteCartStore for HttpCartClient {
    #[instrument(skip(self), fields(identity = %identity))]
    async fn fetch_cart(&self, identity: &CartIdentity) -> Result<Vec<CartItem>, RemoteError> {
        let url = self.cart_url(identity, None)?;
        let response = self.send(self.request(Method::GET, url)).await?;

        // Get response body as text first for better error diagnostics
        let text = response.text().await?;
        let body: CartResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %text.chars().take(BODY_PREVIEW_CHARS).collect::<String>(),
                    "Failed to parse cart response"
                );
                return Err(RemoteError::Parse(e));
            }
        };

        debug!(lines = body.items.len(), "Fetched remote cart");
        Ok(body.items)
    }

    #[instrument(skip(self, line), fields(identity = %identity, line_key = %line.line_key))]
    async fn upsert_line(&self, identity: &CartIdentity, line: &CartItem) -> Result<(), RemoteError> {
        let url = self.cart_url(identity, Some(line.line_key))?;
        self.send(self.request(Method::PUT, url).json(line)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn delete_line(&self, identity: &CartIdentity, line_key: LineKey) -> Result<(), RemoteError> {
        let url = self.cart_url(identity, Some(line_key))?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn clear_cart(&self, identity: &CartIdentity) -> Result<(), RemoteError> {
        let url = self.cart_url(identity, None)?;
        self.send(self.request(Method::DELETE, url)).await?;
        Ok(())
    }
}
