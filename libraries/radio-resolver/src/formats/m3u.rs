use super::{text_lines, Probe, WrapperFormat};
use crate::url_tools::{decode_xml_entities, join_relative};

/// Plain or extended M3U (`.m3u`, `.m3u8`)
#[derive(Debug, Clone, Copy, Default)]
pub struct M3u;

impl WrapperFormat for M3u {
    fn name(&self) -> &'static str {
        "m3u"
    }

    fn detect(&self, probe: &Probe<'_>) -> bool {
        probe.extension == ".m3u"
            || probe.extension == ".m3u8"
            || probe.content_type.contains("mpegurl")
            || probe.body.contains("#extm3u")
    }

    fn first_entry(&self, body: &str, base_url: &str) -> Option<String> {
        text_lines(body)
            .filter(|line| !line.starts_with('#'))
            .find_map(|line| join_relative(base_url, &decode_xml_entities(line)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_uri_line() {
        let body = "#EXTM3U\n#EXTINF:-1,Radio\n\nhttp://s.example/live\nhttp://s.example/backup\n";
        assert_eq!(
            M3u.first_entry(body, "http://h/x.m3u").as_deref(),
            Some("http://s.example/live")
        );
    }

    #[test]
    fn test_relative_entry() {
        let body = "#EXTM3U\r\nchunks/index.aac\r\n";
        assert_eq!(
            M3u.first_entry(body, "https://h/hls/x.m3u8").as_deref(),
            Some("https://h/hls/chunks/index.aac")
        );
    }

    #[test]
    fn test_only_comments() {
        assert_eq!(M3u.first_entry("#EXTM3U\n#EXTINF:1,x\n", "http://h/"), None);
    }
}
