//! Size-capped, interruptible HTTP fetch of wrapper documents

use crate::error::{ResolverError, Result};
use crate::url_tools::is_http_url;
use radio_core::{Interrupt, ResolverSettings};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::io::Read;
use tracing::debug;

/// Read chunk size; the interrupt flag is checked between chunks
const CHUNK_SIZE: usize = 4096;

/// A fetched (possibly truncated) response body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedDocument {
    /// Raw body bytes, at most the configured cap
    pub body: Vec<u8>,

    /// `Content-Type` header as sent, empty when absent
    pub content_type: String,

    /// URL after redirects
    pub final_url: String,
}

impl FetchedDocument {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Source of wrapper documents
///
/// The resolver only depends on this trait so tests can serve canned
/// documents without a network.
#[cfg_attr(test, mockall::automock)]
pub trait Fetch: Send + Sync {
    /// Fetch `url`, giving up early when `interrupt` is requested
    fn fetch(&self, url: &str, interrupt: &Interrupt) -> Result<FetchedDocument>;
}

/// Blocking HTTP fetcher backed by reqwest
///
/// Must not be used from inside an async runtime; the engine calls it from
/// its worker thread.
pub struct HttpFetcher {
    http: Client,
    max_bytes: usize,
}

impl HttpFetcher {
    /// Create a fetcher with the configured timeout and size cap
    pub fn new(settings: &ResolverSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .connect_timeout(settings.timeout())
            .user_agent(format!("RadioEngine/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            max_bytes: settings.max_bytes,
        })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, interrupt: &Interrupt) -> Result<FetchedDocument> {
        if !is_http_url(url) {
            return Err(ResolverError::UnsupportedUrl(url.to_string()));
        }
        if interrupt.is_requested() {
            return Err(ResolverError::Interrupted);
        }

        let mut response = self.http.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolverError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .unwrap_or_default();
        let final_url = response.url().to_string();

        let mut body = Vec::new();
        let mut chunk = [0u8; CHUNK_SIZE];
        while body.len() < self.max_bytes {
            if interrupt.is_requested() {
                return Err(ResolverError::Interrupted);
            }

            let read = response.read(&mut chunk)?;
            if read == 0 {
                break;
            }

            let take = read.min(self.max_bytes - body.len());
            body.extend_from_slice(&chunk[..take]);
        }

        if body.is_empty() {
            return Err(ResolverError::EmptyBody);
        }

        debug!(
            url = %url,
            final_url = %final_url,
            bytes = body.len(),
            "Fetched stream wrapper candidate"
        );

        Ok(FetchedDocument {
            body,
            content_type,
            final_url,
        })
    }
}
