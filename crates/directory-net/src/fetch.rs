//! Bootstrap graph fetching
//!
//! A fetcher retrieves the raw body of a neighbor's graph export. Parsing
//! and verification stay with the caller, so fetch errors are only ever
//! transport problems.

use crate::peer::Neighbor;
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Fetch errors (all non-fatal per neighbor)
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Source of neighbors' exported graphs
pub trait GraphFetcher {
    /// Fetch the body served by `neighbor` at `route`
    fn fetch_graph(
        &self,
        neighbor: &Neighbor,
        route: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// HTTP fetcher with a per-request timeout
#[derive(Clone, Debug)]
pub struct HttpGraphFetcher {
    client: Client,
}

impl HttpGraphFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    async fn get(&self, url: String) -> Result<String, FetchError> {
        debug!("GET {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return Err(classify(url, e)),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        match response.text().await {
            Ok(body) => Ok(body),
            Err(e) => Err(classify(url, e)),
        }
    }
}

fn classify(url: String, source: reqwest::Error) -> FetchError {
    if source.is_timeout() {
        FetchError::Timeout { url }
    } else {
        FetchError::Request { url, source }
    }
}

impl GraphFetcher for HttpGraphFetcher {
    fn fetch_graph(
        &self,
        neighbor: &Neighbor,
        route: &str,
    ) -> impl Future<Output = Result<String, FetchError>> + Send {
        let url = neighbor.graph_url(route);
        self.get(url)
    }
}
