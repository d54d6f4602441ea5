use std::path::PathBuf;
use std::time::Duration;

use crate::loaders::Loader;
use crate::source::client::DEFAULT_BASE_URL;
use crate::source::{DirSource, FetchError, HttpSource, RetryPolicy, SourceCache, SourceProvider};

/// What a pipeline run does
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaders to run; always executed in [`Loader::ALL`] order
    pub loaders: Vec<Loader>,
    /// Run the post-load validator
    pub validate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            loaders: Loader::ALL.to_vec(),
            validate: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_loaders(loaders: Vec<Loader>) -> Self {
        Self {
            loaders,
            ..Self::default()
        }
    }
}

/// Where source documents come from
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub cache_dir: Option<PathBuf>,
    /// Read `<dir>/<doc>.json` instead of the network
    pub input_dir: Option<PathBuf>,
    pub force: bool,
    pub retry: RetryPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: None,
            input_dir: None,
            force: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl SourceConfig {
    pub fn with_retry(mut self, attempts: u32, initial_delay_ms: u64) -> Self {
        self.retry = RetryPolicy::new(attempts, Duration::from_millis(initial_delay_ms));
        self
    }

    pub fn provider(&self) -> Result<Box<dyn SourceProvider>, FetchError> {
        if let Some(dir) = &self.input_dir {
            return Ok(Box::new(DirSource::new(dir.clone())));
        }

        let cache = SourceCache::new(self.cache_dir.clone())?;
        let http = HttpSource::new(self.base_url.clone(), self.retry)?
            .with_cache(cache)
            .force(self.force);
        Ok(Box::new(http))
    }
}
