//! Recursive wrapper-to-stream URL resolution

use crate::fetch::{Fetch, FetchedDocument, HttpFetcher};
use crate::formats::{looks_binary, sniff, Probe};
use crate::url_tools::{extension_lower, has_direct_audio_extension, is_http_url, is_wrapper_extension};
use radio_core::{Interrupt, ResolverSettings};
use tracing::{debug, info, warn};

/// Turns a configured stream URL into a directly playable one
pub trait ResolveUrl: Send + Sync {
    /// Best-effort resolution; returns the (trimmed) input on any failure
    fn resolve(&self, url: &str, interrupt: &Interrupt) -> String;
}

/// Resolver that follows pls/m3u/xspf/rss wrappers
///
/// # Example
///
/// ```ignore
/// use radio_resolver::{ResolveUrl, StreamResolver};
///
/// let resolver = StreamResolver::http(&settings)?;
/// let url = resolver.resolve("http://radio.example/listen.pls", &interrupt);
/// ```
pub struct StreamResolver<F = HttpFetcher> {
    fetcher: F,
    max_depth: u32,
}

impl StreamResolver<HttpFetcher> {
    /// Resolver using the blocking HTTP fetcher
    pub fn http(settings: &ResolverSettings) -> crate::Result<Self> {
        Ok(Self::new(HttpFetcher::new(settings)?, settings.max_depth))
    }
}

impl<F: Fetch> StreamResolver<F> {
    /// Create a resolver over any fetcher
    pub fn new(fetcher: F, max_depth: u32) -> Self {
        Self { fetcher, max_depth }
    }

    fn resolve_at(&self, input: &str, depth: u32, interrupt: &Interrupt) -> String {
        if interrupt.is_requested() {
            return input.to_string();
        }
        if depth > self.max_depth {
            warn!("Stream resolver reached max recursion depth for URL: {}", input);
            return input.to_string();
        }

        let trimmed = input.trim();
        if trimmed.is_empty() || !is_http_url(trimmed) {
            return trimmed.to_string();
        }

        let ext = extension_lower(trimmed);
        if has_direct_audio_extension(&ext) {
            return trimmed.to_string();
        }

        let document = match self.fetcher.fetch(trimmed, interrupt) {
            Ok(document) => document,
            Err(e) => {
                debug!("Stream wrapper fetch failed for {}: {}", trimmed, e);
                return trimmed.to_string();
            }
        };

        let Some(resolved) = first_entry(&document, trimmed, &ext) else {
            return trimmed.to_string();
        };

        if resolved.eq_ignore_ascii_case(trimmed) {
            return resolved;
        }

        info!("Resolved stream URL: {} -> {}", trimmed, resolved);
        if is_wrapper_extension(&extension_lower(&resolved)) {
            return self.resolve_at(&resolved, depth + 1, interrupt);
        }

        resolved
    }
}

impl<F: Fetch> ResolveUrl for StreamResolver<F> {
    fn resolve(&self, url: &str, interrupt: &Interrupt) -> String {
        self.resolve_at(url, 0, interrupt)
    }
}

/// Sniff a fetched document and extract its first playable entry
fn first_entry(document: &FetchedDocument, request_url: &str, ext: &str) -> Option<String> {
    if looks_binary(&document.body) {
        return None;
    }

    let base_url = if document.final_url.is_empty() {
        request_url
    } else {
        document.final_url.as_str()
    };
    let body = document.text();
    let lower_body = body.to_lowercase();
    let content_type = document.content_type.to_lowercase();

    let format = sniff(&Probe {
        extension: ext,
        content_type: &content_type,
        body: &lower_body,
    })?;
    debug!("Stream wrapper {} detected as {}", request_url, format.name());

    format
        .first_entry(&body, base_url)
        .filter(|entry| !entry.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolverError;
    use crate::fetch::MockFetch;
    use mockall::predicate::eq;

    fn document(body: &str, content_type: &str, final_url: &str) -> FetchedDocument {
        FetchedDocument {
            body: body.as_bytes().to_vec(),
            content_type: content_type.to_string(),
            final_url: final_url.to_string(),
        }
    }

    #[test]
    fn test_direct_audio_skips_network() {
        let mut fetcher = MockFetch::new();
        fetcher.expect_fetch().never();
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(
            resolver.resolve("  http://s.example/live.mp3  ", &Interrupt::new()),
            "http://s.example/live.mp3"
        );
    }

    #[test]
    fn test_non_http_returned_trimmed() {
        let mut fetcher = MockFetch::new();
        fetcher.expect_fetch().never();
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(resolver.resolve(" mms://x/y ", &Interrupt::new()), "mms://x/y");
        assert_eq!(resolver.resolve("   ", &Interrupt::new()), "");
    }

    #[test]
    fn test_pls_resolved_against_final_url() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .with(eq("http://r.example/listen.pls"), mockall::predicate::always())
            .times(1)
            .returning(|_, _| {
                Ok(document(
                    "[playlist]\nFile1=live\n",
                    "audio/x-scpls",
                    "http://cdn.example/radio/listen.pls",
                ))
            });
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(
            resolver.resolve("http://r.example/listen.pls", &Interrupt::new()),
            "http://cdn.example/radio/live"
        );
    }

    #[test]
    fn test_fetch_failure_returns_input() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .returning(|_, _| Err(ResolverError::Status(404)));
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(
            resolver.resolve("http://r.example/listen.m3u", &Interrupt::new()),
            "http://r.example/listen.m3u"
        );
    }

    #[test]
    fn test_binary_body_rejected() {
        let mut fetcher = MockFetch::new();
        fetcher.expect_fetch().returning(|_, _| {
            Ok(FetchedDocument {
                body: b"#EXTM3U\nhttp://x/\0".to_vec(),
                content_type: "audio/x-mpegurl".to_string(),
                final_url: String::new(),
            })
        });
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(
            resolver.resolve("http://r.example/stream", &Interrupt::new()),
            "http://r.example/stream"
        );
    }

    #[test]
    fn test_unknown_document_returns_input() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .returning(|_, _| Ok(document("<html>hello</html>", "text/html", "")));
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(
            resolver.resolve("http://r.example/page", &Interrupt::new()),
            "http://r.example/page"
        );
    }

    #[test]
    fn test_same_url_case_insensitive_stops() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(document("#EXTM3U\nHTTP://R.EXAMPLE/LIVE.M3U\n", "", "")));
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(
            resolver.resolve("http://r.example/live.m3u", &Interrupt::new()),
            "HTTP://R.EXAMPLE/LIVE.M3U"
        );
    }

    #[test]
    fn test_nested_wrappers_followed() {
        let mut fetcher = MockFetch::new();
        fetcher
            .expect_fetch()
            .with(eq("http://r.example/outer.pls"), mockall::predicate::always())
            .returning(|_, _| Ok(document("File1=http://r.example/inner.m3u\n", "", "")));
        fetcher
            .expect_fetch()
            .with(eq("http://r.example/inner.m3u"), mockall::predicate::always())
            .returning(|_, _| Ok(document("http://s.example/stream\n", "", "")));
        let resolver = StreamResolver::new(fetcher, 4);

        assert_eq!(
            resolver.resolve("http://r.example/outer.pls", &Interrupt::new()),
            "http://s.example/stream"
        );
    }

    #[test]
    fn test_recursion_is_bounded() {
        let mut fetcher = MockFetch::new();
        fetcher.expect_fetch().times(3).returning(|url, _| {
            let next = if url.ends_with("a.m3u") {
                "http://r.example/b.m3u"
            } else {
                "http://r.example/a.m3u"
            };
            Ok(document(next, "", ""))
        });
        let resolver = StreamResolver::new(fetcher, 2);

        // depth 0 and 1 and 2 fetch; depth 3 gives up with its own input
        assert_eq!(
            resolver.resolve("http://r.example/a.m3u", &Interrupt::new()),
            "http://r.example/b.m3u"
        );
    }

    #[test]
    fn test_interrupt_returns_input() {
        let mut fetcher = MockFetch::new();
        fetcher.expect_fetch().never();
        let resolver = StreamResolver::new(fetcher, 4);
        let interrupt = Interrupt::new();
        interrupt.request();

        assert_eq!(
            resolver.resolve("http://r.example/listen.pls", &interrupt),
            "http://r.example/listen.pls"
        );
    }
}
