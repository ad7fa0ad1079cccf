//! Downloading uploaded files from their storage URL

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Url};
use std::time::Duration;

use crate::error::{Error, Result};

/// Bytes of a downloaded file
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub bytes: Bytes,
}

/// Trait for retrieving an uploaded file's bytes
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch the file, failing with `Error::FileTooLarge` past `max_bytes`
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<FetchedFile>;
}

/// Plain HTTP(S) fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<FetchedFile> {
        let parsed = Url::parse(url).map_err(|e| Error::fetch(url, format!("invalid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::fetch(
                url,
                format!("unsupported URL scheme '{}'", parsed.scheme()),
            ));
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| Error::fetch(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch_status(url, status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > max_bytes {
                return Err(Error::FileTooLarge { size: length, max: max_bytes });
            }
        }

        // Content-Length may be absent or wrong, so the limit is enforced while reading
        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::fetch(url, format!("failed to read body: {}", e)))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > max_bytes {
                return Err(Error::FileTooLarge { size, max: max_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} ({} bytes)", url, body.len());

        Ok(FetchedFile {
            bytes: body.freeze(),
        })
    }
}
