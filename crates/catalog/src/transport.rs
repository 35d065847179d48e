//! The HTTP seam between [`CatalogClient`](crate::CatalogClient) and the network.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::sync::Arc;
use std::time::Duration;

/// Default root of the RetroAchievements web API.
pub const DEFAULT_BASE_URL: &str = "https://retroachievements.org/API";
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw response: status code and body, nothing interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }
}

/// Performs one GET request against a catalog endpoint.
///
/// Implementations report connection-level failures as
/// [`ErrorKind::Transient`]; everything else (including 4xx/5xx) comes back
/// as a [`Response`] for the client to classify.
pub trait Transport: Send + Sync {
    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Response>;
}

pub type TransportHandle = Arc<dyn Transport>;

/// [`Transport`] backed by a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rasort/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Client)?;
        Ok(Self { client, base_url: base_url.into() })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
    }
}

impl Transport for HttpTransport {
    fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<Response> {
        // The query string carries the API key, so strip URLs from any error
        // before it can end up in a log line.
        let response = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .send()
            .map_err(reqwest::Error::without_url)
            .or_raise(|| ErrorKind::Transient(format!("request to {endpoint} failed")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(reqwest::Error::without_url)
            .or_raise(|| ErrorKind::Transient(format!("could not read response from {endpoint}")))?;
        tracing::trace!(endpoint, status, bytes = body.len(), "Catalog response");
        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://retroachievements.org/API", "API_GetGameList.php")]
    #[case("https://retroachievements.org/API/", "API_GetGameList.php")]
    #[case("https://retroachievements.org/API", "/API_GetGameList.php")]
    fn test_url_joining(#[case] base_url: &str, #[case] endpoint: &str) {
        let transport = HttpTransport::new(base_url, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(transport.url(endpoint), "https://retroachievements.org/API/API_GetGameList.php");
    }
}
