//! Wrapper document formats
//!
//! Each format knows how to recognise itself from a fetched response and how
//! to pull the first playable entry out of the body. Formats are tried in a
//! fixed priority order; the first one that recognises the response owns it.

mod m3u;
mod pls;
mod rss;
mod xspf;

pub use m3u::M3u;
pub use pls::Pls;
pub use rss::RssAtom;
pub use xspf::Xspf;

/// What a format may look at when deciding whether a response is its own
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    /// Lowercase extension of the requested URL (see `extension_lower`)
    pub extension: &'a str,

    /// Lowercase `Content-Type` header, empty when absent
    pub content_type: &'a str,

    /// Lowercase body text
    pub body: &'a str,
}

/// A wrapper playlist/feed format
pub trait WrapperFormat: Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether the response looks like this format
    fn detect(&self, probe: &Probe<'_>) -> bool;

    /// First playable entry, already joined against `base_url`
    fn first_entry(&self, body: &str, base_url: &str) -> Option<String>;
}

/// All formats in detection priority order
pub const FORMATS: &[&dyn WrapperFormat] = &[&Pls, &M3u, &Xspf, &RssAtom];

/// Pick the format that owns a response, if any
pub fn sniff(probe: &Probe<'_>) -> Option<&'static dyn WrapperFormat> {
    FORMATS.iter().copied().find(|format| format.detect(probe))
}

/// Reject bodies that are clearly not text
///
/// A NUL byte, or control characters (other than CR, LF and tab) making up
/// more than 3% of the body, mark it as binary.
pub fn looks_binary(body: &[u8]) -> bool {
    if body.is_empty() {
        return false;
    }

    let mut control = 0usize;
    for &byte in body {
        if byte == 0 {
            return true;
        }
        if byte < 32 && !matches!(byte, b'\n' | b'\r' | b'\t') {
            control += 1;
        }
    }

    control * 100 / body.len() > 3
}

/// Trimmed, non-empty lines of a text body
pub(crate) fn text_lines(body: &str) -> impl Iterator<Item = &str> {
    body.split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}
