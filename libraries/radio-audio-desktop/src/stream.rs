//! HTTP stream bodies for the decoder

use crate::decoder::TrackDecoder;
use crate::error::Result;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use symphonia::core::io::ReadOnlySource;
use url::Url;

/// Whether a location is an http(s) URL rather than a file path
pub fn is_remote(location: &str) -> bool {
    Url::parse(location.trim())
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// HTTP client for live streams
///
/// Only the connect phase is bounded; a live body has no end.
pub fn stream_client(connect_timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(connect_timeout)
        .timeout(None::<Duration>)
        .user_agent(format!("RadioEngine/{}", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Connect to `url` and probe the stream format
///
/// Reads from the body end as soon as `cancel` is set.
pub fn connect(client: &Client, url: &str, cancel: &Arc<AtomicBool>) -> Result<TrackDecoder> {
    let response = client.get(url).send()?.error_for_status()?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let extension = extension_hint(&content_type, url);
    tracing::debug!(url = %url, content_type = %content_type, "Connected to stream");

    let body = HttpBody {
        response: Mutex::new(response),
        cancel: Arc::clone(cancel),
    };
    TrackDecoder::open(Box::new(ReadOnlySource::new(body)), extension.as_deref())
}

/// Format hint from the content type, falling back to the URL path
pub fn extension_hint(content_type: &str, url: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let from_mime = match mime.as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" => Some("mp3"),
        "audio/aac" | "audio/aacp" | "audio/x-aac" => Some("aac"),
        "audio/ogg" | "application/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        _ => None,
    };
    if let Some(extension) = from_mime {
        return Some(extension.to_string());
    }

    let parsed = Url::parse(url).ok()?;
    Path::new(parsed.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Response body that reports end of stream once cancelled
struct HttpBody {
    response: Mutex<Response>,
    cancel: Arc<AtomicBool>,
}

impl Read for HttpBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.load(Ordering::Acquire) {
            return Ok(0);
        }
        self.response
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .read(buf)
    }
}
