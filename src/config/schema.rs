use crate::error::Result;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MonitorConfig {
    #[serde(default = "default_name")]
    #[validate(length(min = 1))]
    pub name: String,

    /// Root of the crawler's admin API, e.g. `http://localhost:5000`.
    #[serde(default)]
    #[validate(url)]
    pub base_url: String,

    #[serde(default = "default_poll_interval")]
    #[validate(range(min = 100))]
    pub poll_interval_ms: u64,

    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,

    /// Number of points each chart keeps.
    #[serde(default = "default_window")]
    #[validate(range(min = 1, max = 10000))]
    pub window: usize,

    #[serde(default)]
    #[validate]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub output: Option<OutputConfig>,

    /// Optional path to a parent configuration file to inherit from
    #[serde(default)]
    pub extends: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputConfig {
    Console,
    Json {
        path: String,
    },
    Csv {
        path: String,
    },
}

impl MonitorConfig {
    pub fn for_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_url: String::new(),
            poll_interval_ms: default_poll_interval(),
            request_timeout_ms: default_request_timeout(),
            window: default_window(),
            retry: RetryPolicy::default(),
            output: None,
            extends: None,
        }
    }
}

pub(crate) fn default_name() -> String {
    "crawl-monitor".to_string()
}

pub(crate) fn default_poll_interval() -> u64 {
    5000
}

pub(crate) fn default_request_timeout() -> u64 {
    10_000
}

pub(crate) fn default_window() -> usize {
    crate::metrics::series::DEFAULT_WINDOW
}
