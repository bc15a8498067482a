//! Network downloads of repository signing keys.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

/// Downloads a signing key.
pub trait KeyFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>>;
}

/// Fetches keys over HTTP(S) with a blocking client.
#[derive(Debug, Clone)]
pub struct HttpKeyFetcher {
    timeout: Duration,
}

impl HttpKeyFetcher {
    pub fn new(timeout: Duration) -> Self {
        HttpKeyFetcher { timeout }
    }
}

impl Default for HttpKeyFetcher {
    fn default() -> Self {
        HttpKeyFetcher::new(Duration::from_secs(30))
    }
}

impl KeyFetcher for HttpKeyFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        tracing::debug!("fetching signing key from {}", url);

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("failed to build HTTP client")?;

        let response = client
            .get(url.clone())
            .send()
            .with_context(|| format!("failed to download key from {}", url))?;

        if !response.status().is_success() {
            bail!("failed to download key from {}: HTTP {}", url, response.status());
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read key body from {}", url))?;

        if bytes.is_empty() {
            bail!("key downloaded from {} is empty", url);
        }

        Ok(bytes.to_vec())
    }
}
