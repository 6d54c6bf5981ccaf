//! Small URL helpers shared by the resolver and the stream fallback chain

use url::Url;

/// Extensions that are played directly without a wrapper lookup
pub const DIRECT_AUDIO_EXTENSIONS: &[&str] = &[
    ".mp3", ".aac", ".m4a", ".ogg", ".opus", ".wav", ".flac", ".wma",
];

/// Extensions of playlist/feed documents that point at the real stream
pub const WRAPPER_EXTENSIONS: &[&str] = &[".pls", ".m3u", ".m3u8", ".xspf", ".rss", ".atom", ".xml"];

/// Check for an `http://` or `https://` prefix, case-insensitively
pub fn is_http_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Lowercase extension of the URL path, including the dot
///
/// The query and fragment are ignored. Returns an empty string when the
/// last path segment has no dot.
///
/// # Example
///
/// ```
/// use radio_resolver::url_tools::extension_lower;
///
/// assert_eq!(extension_lower("http://host/live.PLS?sid=1"), ".pls");
/// assert_eq!(extension_lower("http://host.example/stream"), "");
/// ```
pub fn extension_lower(url: &str) -> String {
    let trimmed = url.trim();
    let path = trimmed
        .find(['?', '#'])
        .map_or(trimmed, |end| &trimmed[..end]);

    let Some(dot) = path.rfind('.') else {
        return String::new();
    };
    if path.rfind('/').is_some_and(|slash| dot < slash) {
        return String::new();
    }

    path[dot..].to_ascii_lowercase()
}

pub fn has_direct_audio_extension(ext: &str) -> bool {
    DIRECT_AUDIO_EXTENSIONS.contains(&ext)
}

pub fn is_wrapper_extension(ext: &str) -> bool {
    WRAPPER_EXTENSIONS.contains(&ext)
}

/// `https://x` -> `http://x`; `None` for anything else
///
/// The prefix match is case-sensitive.
pub fn https_to_http(url: &str) -> Option<String> {
    url.strip_prefix("https://").map(|rest| format!("http://{rest}"))
}

/// `http://x` -> `https://x`; `None` for anything else
pub fn http_to_https(url: &str) -> Option<String> {
    url.strip_prefix("http://").map(|rest| format!("https://{rest}"))
}

/// Shoutcast-style root variants of a stream URL
///
/// Many shoutcast servers only stream from `/;` or `/`. For a URL with any
/// other path, returns `scheme://host[:port]/;` followed by
/// `scheme://host[:port]/`. The query string is dropped.
pub fn shoutcast_variants(url: &str) -> Vec<String> {
    if !is_http_url(url) {
        return Vec::new();
    }
    let Ok(parsed) = Url::parse(url.trim()) else {
        return Vec::new();
    };
    let Some(host) = parsed.host_str().filter(|host| !host.is_empty()) else {
        return Vec::new();
    };

    let path = parsed.path();
    if path.is_empty() || path == "/" || path == "/;" {
        return Vec::new();
    }

    let port = parsed.port().map(|port| format!(":{port}")).unwrap_or_default();
    let root = format!("{}://{host}{port}", parsed.scheme());
    vec![format!("{root}/;"), format!("{root}/")]
}

/// Decode the five predefined XML entities
pub fn decode_xml_entities(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
}

/// Resolve a playlist entry against the document's final URL
///
/// Absolute http(s) entries are returned as-is, protocol-relative entries
/// take the base scheme, and relative entries are joined browser-style.
/// Returns `None` for an empty entry.
pub fn join_relative(base_url: &str, entry: &str) -> Option<String> {
    if entry.is_empty() {
        return None;
    }
    if is_http_url(entry) {
        return Some(entry.to_string());
    }
    if entry.starts_with("//") {
        let scheme = if base_url.to_ascii_lowercase().starts_with("https://") {
            "https:"
        } else {
            "http:"
        };
        return Some(format!("{scheme}{entry}"));
    }
    if !is_http_url(base_url) {
        return Some(entry.to_string());
    }

    let joined = Url::parse(base_url.trim())
        .and_then(|base| base.join(entry))
        .map(String::from)
        .unwrap_or_else(|_| entry.to_string());
    Some(joined)
}

/// Ordered, case-insensitively deduplicated list of URLs to try for a stream
///
/// Each family is the base URL, its scheme swaps, and (unless the base looks
/// like a wrapper document) its shoutcast root variants with their own scheme
/// swaps. The configured URL's family is skipped when it is a wrapper that the
/// resolver already unwrapped to something else.
///
/// # Arguments
/// * `direct` - The configured stream URL
/// * `resolved` - What the resolver returned for it
pub fn stream_candidates(direct: &str, resolved: &str) -> Vec<String> {
    let direct = direct.trim();
    let resolved = resolved.trim();
    let mut candidates = Vec::new();

    let direct_is_wrapper = is_wrapper_extension(&extension_lower(direct));
    let has_alternative = !resolved.is_empty() && !resolved.eq_ignore_ascii_case(direct);

    if !direct_is_wrapper || !has_alternative {
        add_family(&mut candidates, direct);
    }
    if has_alternative {
        add_family(&mut candidates, resolved);
    }
    if candidates.is_empty() {
        add_candidate(&mut candidates, Some(direct.to_string()));
    }

    candidates
}

fn add_family(candidates: &mut Vec<String>, base: &str) {
    add_candidate(candidates, Some(base.to_string()));
    add_candidate(candidates, https_to_http(base));
    add_candidate(candidates, http_to_https(base));

    if is_wrapper_extension(&extension_lower(base)) {
        return;
    }
    for variant in shoutcast_variants(base) {
        let downgraded = https_to_http(&variant);
        let upgraded = http_to_https(&variant);
        add_candidate(candidates, Some(variant));
        add_candidate(candidates, downgraded);
        add_candidate(candidates, upgraded);
    }
}

fn add_candidate(candidates: &mut Vec<String>, url: Option<String>) {
    let Some(url) = url else { return };
    let url = url.trim();
    if url.is_empty() || candidates.iter().any(|existing| existing.eq_ignore_ascii_case(url)) {
        return;
    }
    candidates.push(url.to_string());
}
