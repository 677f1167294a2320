use std::time::Duration;
use tracing::debug;

use crate::aggregate::Aggregator;
use crate::config::load_config;
use crate::error::{Error, Result};
use crate::page::{self, PageEnvelope};
use crate::query::SeriesQuery;
use crate::table::SeriesTable;
use crate::transport::{HttpTransport, Transport};
use crate::version::ApiVersionRange;

/// Public DBnomics Web API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.db.nomics.world/v22";

/// Series cap applied when a download passes no `max_results`.
pub const DEFAULT_MAX_RESULTS: usize = 50;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base Web API URL, typically `https://api.db.nomics.world/v22`.
    pub url: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    /// Cap used when `fetch_all` is called without `max_results`.
    ///
    /// Exceeding it is an error, not a silent truncation.
    pub default_max_results: usize,
    /// Server versions accepted, `None` to skip the check.
    pub api_version_range: Option<ApiVersionRange>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_BASE_URL.to_string(),
            verify: true,
            default_max_results: DEFAULT_MAX_RESULTS,
            api_version_range: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client<T = HttpTransport> {
    url: String,
    verify: bool,
    default_max_results: usize,
    api_version_range: Option<ApiVersionRange>,
    progress: bool,

    transport: T,
}

impl Client<HttpTransport> {
    /// Creates a client using environment variables and/or `.dbnomicsrc`.
    ///
    /// This is equivalent to `Client::new(None, None)`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`verify` arguments
    /// - environment variable `DBNOMICS_API_URL`
    /// - config file from `DBNOMICS_RC` or `.dbnomicsrc`
    /// - the public Web API
    pub fn new(url: Option<String>, verify: Option<bool>) -> Result<Self> {
        let cfg = load_config(url, verify).map_err(Error::Config)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: ClientConfig) -> Result<Self> {
        let transport = build_transport(HttpTransport::DEFAULT_TIMEOUT, cfg.verify)?;
        Ok(Self::with_transport(cfg, transport))
    }

    /// Rebuilds the HTTP transport with a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.transport = build_transport(timeout, self.verify)?;
        Ok(self)
    }
}

fn build_transport(timeout: Duration, verify: bool) -> Result<HttpTransport> {
    HttpTransport::new(timeout, verify)
        .map_err(|e| Error::Config(anyhow::Error::new(e).context("failed to build HTTP client")))
}

impl<T: Transport> Client<T> {
    /// Creates a client issuing its requests through `transport`.
    pub fn with_transport(cfg: ClientConfig, transport: T) -> Self {
        Self {
            url: cfg.url.trim_end_matches('/').to_string(),
            verify: cfg.verify,
            default_max_results: cfg.default_max_results,
            api_version_range: cfg.api_version_range,
            progress: false,
            transport,
        }
    }

    pub fn with_default_max_results(mut self, default_max_results: usize) -> Self {
        self.default_max_results = default_max_results;
        self
    }

    pub fn with_api_version_range(mut self, range: ApiVersionRange) -> Self {
        self.api_version_range = Some(range);
        self
    }

    /// Shows a progress bar on stderr while pages are downloaded.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.url
    }

    pub fn default_max_results(&self) -> usize {
        self.default_max_results
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches and validates the page of `endpoint` starting at `offset`.
    ///
    /// `offset` counts the series already retrieved.
    pub fn fetch_page(&self, endpoint: &str, offset: u64) -> Result<PageEnvelope> {
        page::fetch_page(
            &self.transport,
            endpoint,
            offset,
            self.api_version_range.as_ref(),
        )
    }

    /// Downloads every page of `endpoint` and flattens the series into rows.
    ///
    /// With `max_results = None` the default cap applies and a larger result
    /// set fails with [`Error::TooManyResults`] before anything is
    /// accumulated. With `Some(n)` at most `n` distinct series are kept.
    pub fn fetch_all(&self, endpoint: &str, max_results: Option<usize>) -> Result<SeriesTable> {
        if endpoint.trim().is_empty() {
            return Err(Error::invalid_argument("endpoint is empty"));
        }
        debug!(endpoint, ?max_results, "downloading series");

        let aggregator = Aggregator {
            default_max_results: self.default_max_results,
            progress: self.progress,
        };
        aggregator.run(max_results, |offset| self.fetch_page(endpoint, offset))
    }

    /// Builds the endpoint of `query` against the client's base URL and
    /// downloads it.
    pub fn fetch_series(
        &self,
        query: &SeriesQuery,
        max_results: Option<usize>,
    ) -> Result<SeriesTable> {
        let endpoint = query.endpoint(&self.url)?;
        self.fetch_all(&endpoint, max_results)
    }
}
