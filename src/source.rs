use crate::error::{Error, Result};
use crate::metrics::snapshot::Snapshot;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

pub const STATS_PATH: &str = "admin/stats";
pub const PAUSE_PATH: &str = "admin/pause";
pub const RESUME_PATH: &str = "admin/resume";

const USER_AGENT: &str = concat!("crawl-monitor/", env!("CARGO_PKG_VERSION"));

/// Anything that can produce a fresh status snapshot on demand.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Snapshot>;
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Joins `path` onto `base`, keeping any path prefix the base already has.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    Ok(base.join(path)?)
}

/// Reads snapshots from the backend's `GET /admin/stats`.
pub struct HttpSnapshotSource {
    client: Client,
    url: Url,
}

impl HttpSnapshotSource {
    pub fn new(client: Client, base: &Url) -> Result<Self> {
        Ok(Self {
            client,
            url: endpoint(base, STATS_PATH)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Snapshot> {
        log::debug!("Fetching {}", self.url);

        let res = self.client.get(self.url.clone()).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: self.url.to_string(),
                status,
            });
        }

        let snapshot = res.json::<Snapshot>().await?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_prefix() {
        let base = Url::parse("http://localhost:5000/crawler").unwrap();
        assert_eq!(
            endpoint(&base, STATS_PATH).unwrap().as_str(),
            "http://localhost:5000/crawler/admin/stats"
        );
    }

    #[test]
    fn endpoint_on_bare_host() {
        let base = Url::parse("http://localhost:5000").unwrap();
        assert_eq!(
            endpoint(&base, PAUSE_PATH).unwrap().as_str(),
            "http://localhost:5000/admin/pause"
        );
    }
}
