// src/repository/mod.rs

//! Mirror access
//!
//! This module provides functionality for:
//! - Fetching raw bytes from the mirror with retry support
//! - Loading and caching the parsed package index (see [`index`])

pub mod index;

use crate::error::{Error, Result};
use crate::progress::DownloadProgress;
use reqwest::blocking::Client;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use index::{PackageIndex, PackageRecord};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Read buffer size for streamed downloads
const DL_BUFFER_SIZE: usize = 8192;

/// Upper bound on the buffer reserved from a Content-Length header
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Byte-fetch collaborator used by the index loader and the installer
pub trait Fetcher {
    /// Fetch the full body at `url`, optionally rendering a progress bar
    fn fetch(&self, url: &str, show_progress: bool) -> Result<Vec<u8>>;
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Stream a successful response body into memory
    fn read_body(response: reqwest::blocking::Response, url: &str, show_progress: bool) -> Result<Vec<u8>> {
        let total = response.content_length();
        let progress = DownloadProgress::new(url, total, show_progress);

        let mut reader = response;
        let mut data = Vec::with_capacity(initial_capacity(total));
        let mut buf = [0u8; DL_BUFFER_SIZE];
        loop {
            let n = reader
                .read(&mut buf)
                .map_err(|e| Error::Download(format!("Failed to read response from {}: {}", url, e)))?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            progress.advance(n);
        }
        progress.finish();

        debug!("Downloaded {} bytes from {}", data.len(), url);
        Ok(data)
    }
}

impl Fetcher for RepositoryClient {
    fn fetch(&self, url: &str, show_progress: bool) -> Result<Vec<u8>> {
        info!("Downloading {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return Self::read_body(response, url, show_progress);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::Download(format!(
                            "Failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

/// Buffer size to reserve for a body of advertised length `total`
fn initial_capacity(total: Option<u64>) -> usize {
    total.unwrap_or(0).min(MAX_PREALLOC) as usize
}

/// Join a mirror base URL and a path relative to it
pub fn mirror_url(mirror: &str, path: &str) -> String {
    format!(
        "{}/{}",
        mirror.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
