use super::{Probe, WrapperFormat};
use crate::url_tools::{decode_xml_entities, join_relative};
use regex::Regex;
use std::sync::OnceLock;

/// XML Shareable Playlist Format
#[derive(Debug, Clone, Copy, Default)]
pub struct Xspf;

fn location_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)<\s*location\s*>\s*([^<]+?)\s*<\s*/\s*location\s*>").ok())
        .as_ref()
}

impl WrapperFormat for Xspf {
    fn name(&self) -> &'static str {
        "xspf"
    }

    fn detect(&self, probe: &Probe<'_>) -> bool {
        probe.extension == ".xspf"
            || probe.content_type.contains("xspf")
            || (probe.body.contains("<playlist") && probe.body.contains("xspf.org/ns/0/"))
    }

    fn first_entry(&self, body: &str, base_url: &str) -> Option<String> {
        let location = location_pattern()?.captures(body)?.get(1)?;
        join_relative(base_url, &decode_xml_entities(location.as_str()))
    }
}
