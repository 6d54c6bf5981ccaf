use super::{Probe, WrapperFormat};
use crate::url_tools::{decode_xml_entities, join_relative};
use regex::Regex;
use std::sync::OnceLock;

/// RSS or Atom feed carrying the stream as an enclosure
#[derive(Debug, Clone, Copy, Default)]
pub struct RssAtom;

/// Enclosure patterns, most specific first
fn enclosure_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#"(?i)<\s*enclosure\b[^>]*\burl\s*=\s*["']([^"']+)["']"#,
            r#"(?i)<\s*link\b[^>]*\brel\s*=\s*["']enclosure["'][^>]*\bhref\s*=\s*["']([^"']+)["']"#,
            r#"(?i)<\s*link\b[^>]*\bhref\s*=\s*["']([^"']+)["'][^>]*\brel\s*=\s*["']enclosure["']"#,
        ]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
    })
}

impl WrapperFormat for RssAtom {
    fn name(&self) -> &'static str {
        "rss"
    }

    fn detect(&self, probe: &Probe<'_>) -> bool {
        matches!(probe.extension, ".rss" | ".atom" | ".xml")
            || probe.content_type.contains("rss")
            || probe.content_type.contains("atom")
            || probe.body.contains("<rss")
            || probe.body.contains("<feed")
    }

    fn first_entry(&self, body: &str, base_url: &str) -> Option<String> {
        let url = enclosure_patterns()
            .iter()
            .find_map(|pattern| pattern.captures(body)?.get(1))?;
        join_relative(base_url, &decode_xml_entities(url.as_str()))
    }
}
