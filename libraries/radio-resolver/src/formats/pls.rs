use super::{text_lines, Probe, WrapperFormat};
use crate::url_tools::{decode_xml_entities, join_relative};
use std::collections::BTreeMap;

/// Shoutcast `.pls` playlist (`[playlist]` / `FileN=` keys)
#[derive(Debug, Clone, Copy, Default)]
pub struct Pls;

/// Indices given to `File=` keys without a usable number
const FALLBACK_INDEX_START: i64 = 1000;

impl WrapperFormat for Pls {
    fn name(&self) -> &'static str {
        "pls"
    }

    fn detect(&self, probe: &Probe<'_>) -> bool {
        probe.extension == ".pls"
            || probe.content_type.contains("audio/x-scpls")
            || probe.body.contains("[playlist]")
    }

    fn first_entry(&self, body: &str, base_url: &str) -> Option<String> {
        let mut entries = BTreeMap::new();
        let mut fallback = FALLBACK_INDEX_START;

        for line in text_lines(body) {
            if line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };

            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            let Some(suffix) = key.strip_prefix("file") else {
                continue;
            };
            if value.is_empty() {
                continue;
            }

            let index = leading_integer(suffix.trim()).unwrap_or_else(|| {
                let index = fallback;
                fallback += 1;
                index
            });
            entries.insert(index, join_relative(base_url, &decode_xml_entities(value)));
        }

        entries.into_values().flatten().next()
    }
}

/// Parse an optionally signed run of leading digits ("12abc" -> 12)
fn leading_integer(text: &str) -> Option<i64> {
    let sign_len = usize::from(text.starts_with(['+', '-']));
    let digits = text[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    text[..sign_len + digits].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://radio.example/tune/list.pls";

    #[test]
    fn test_lowest_index_wins() {
        let body = "[playlist]\nNumberOfEntries=2\nFile2=http://b.example/two\nFile1=http://a.example/one\n";
        assert_eq!(
            Pls.first_entry(body, BASE).as_deref(),
            Some("http://a.example/one")
        );
    }

    #[test]
    fn test_comments_and_empty_values_skipped() {
        let body = "; comment\n# also comment\nFile1=\nFile2 = stream.mp3\r\n";
        assert_eq!(
            Pls.first_entry(body, BASE).as_deref(),
            Some("http://radio.example/tune/stream.mp3")
        );
    }

    #[test]
    fn test_unnumbered_keys_sort_after_numbered() {
        let body = "File=http://late.example/\nFile7=http://early.example/\n";
        assert_eq!(
            Pls.first_entry(body, BASE).as_deref(),
            Some("http://early.example/")
        );
    }

    #[test]
    fn test_entities_decoded() {
        let body = "File1=http://a.example/s?x=1&amp;y=2\n";
        assert_eq!(
            Pls.first_entry(body, BASE).as_deref(),
            Some("http://a.example/s?x=1&y=2")
        );
    }

    #[test]
    fn test_no_entries() {
        assert_eq!(Pls.first_entry("[playlist]\nTitle1=x\n", BASE), None);
    }

    #[test]
    fn test_leading_integer() {
        assert_eq!(leading_integer("12"), Some(12));
        assert_eq!(leading_integer("3abc"), Some(3));
        assert_eq!(leading_integer("-1"), Some(-1));
        assert_eq!(leading_integer(""), None);
        assert_eq!(leading_integer("abc"), None);
    }
}
