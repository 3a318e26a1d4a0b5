//! HTTP transport for the remote document.
//!
//! GET reads the document, PUT replaces it. Both use Basic authentication
//! and carry the marker header.

use std::time::Duration;

use tracing::{debug, info};

use crate::config::ValidSettings;
use crate::error::{Error, Result};
use crate::model::BookmarkRecord;

use super::{marker_value, parse_document, RemoteDocument, RemoteStore, MARKER_HEADER};

/// Request timeout for both directions.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one remote document.
pub struct RemoteClient {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl RemoteClient {
    /// Create a client for `url` with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(marker_value())
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Create a client from validated settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_settings(settings: &ValidSettings) -> Result<Self> {
        Self::new(&settings.url, &settings.username, &settings.password)
    }

    /// Document URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self, method: reqwest::Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, &self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(MARKER_HEADER, marker_value())
    }
}

impl RemoteStore for RemoteClient {
    async fn fetch(&self) -> Result<RemoteDocument> {
        let response = self.request(reqwest::Method::GET).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(url = %self.url, status, bytes = body.len(), "Fetched remote document");
        Ok(parse_document(status, &body))
    }

    async fn push(&self, records: &[BookmarkRecord]) -> Result<()> {
        let response = self
            .request(reqwest::Method::PUT)
            .json(records)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            debug!(url = %self.url, status = status.as_u16(), detail = %detail, "Remote rejected write");
            return Err(Error::RemoteWrite {
                status: status.as_u16(),
            });
        }

        info!(url = %self.url, records = records.len(), "Pushed remote document");
        Ok(())
    }
}
