use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{FetchError, RetryPolicy, SourceCache, SourceDoc, SourceProvider};

/// Public Korean-locale gamedata export
pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/ArknightsAssets/ArknightsGamedata/master/kr/gamedata/excel/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Fetches documents over HTTP, keeping a copy of each in the cache
pub struct HttpSource {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    cache: Option<SourceCache>,
    force: bool,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("arkdata-to-sqlite/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            retry,
            cache: None,
            force: false,
        })
    }

    pub fn with_cache(mut self, cache: SourceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Ignore cached copies and always hit the network
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn url(&self, doc: SourceDoc) -> String {
        format!("{}{}", self.base_url, doc.file_name())
    }

    /// Download and parse `doc`; a body that does not parse counts as a
    /// failed attempt
    fn download(&self, doc: SourceDoc) -> Result<(String, Value), FetchError> {
        let url = self.url(doc);
        self.retry.run(doc.name(), || {
            debug!(%url, "requesting");
            let response = self.client.get(&url).send()?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.clone(),
                });
            }

            let body = response.text()?;
            let value = parse_body(&url, &body)?;
            Ok((body, value))
        })
    }
}

pub(crate) fn parse_body(url: &str, body: &str) -> Result<Value, FetchError> {
    serde_json::from_str(body).map_err(|source| FetchError::Malformed {
        url: url.to_string(),
        source,
    })
}

impl SourceProvider for HttpSource {
    fn fetch(&self, doc: SourceDoc) -> Result<Value, FetchError> {
        if let Some(cache) = &self.cache {
            if !self.force && cache.is_cached(doc) {
                debug!(%doc, "using cached copy");
                match cache.load(doc) {
                    Err(FetchError::Json(e)) => {
                        warn!(%doc, error = %e, "cached copy is corrupt, downloading again");
                        cache.evict(doc)?;
                    }
                    loaded => return loaded,
                }
            }
        }

        let (body, value) = self.download(doc)?;
        info!(%doc, bytes = body.len(), "downloaded");

        if let Some(cache) = &self.cache {
            cache.store(doc, &body)?;
        }

        Ok(value)
    }
}
