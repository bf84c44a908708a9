// Feed body decoding — the lightning feed arrives as UTF-8 or UTF-16.
//
// Some detector firmwares serve UTF-16 with a BOM, some without, some plain
// UTF-8; detection order:
//   1. UTF-16 LE/BE byte-order mark → decode accordingly
//   2. NUL bytes early in the body → try UTF-16 LE, accept only if the
//      result looks like XML
//   3. otherwise UTF-8

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::constants;

/// Decode a feed body into text, sniffing the encoding.
///
/// Returns `None` only when a BOM promises UTF-16 and the payload is not
/// valid UTF-16; the UTF-8 fallback is lossy and always succeeds.
pub fn decode_body(body: &[u8]) -> Option<String> {
    if let Some(rest) = body.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, true);
    }
    if let Some(rest) = body.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, false);
    }

    let window = &body[..body.len().min(constants::lightning::UTF16_SCAN_WINDOW)];
    if window.contains(&0) {
        if let Some(text) = decode_utf16(body, true) {
            if text.contains("<?xml") {
                return Some(text);
            }
        }
    }

    Some(String::from_utf8_lossy(body).into_owned())
}

fn decode_utf16(bytes: &[u8], little_endian: bool) -> Option<String> {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units).ok()
}

/// Extract the value of the first `<lightningalert>` element.
///
/// The tag name is matched case-sensitively, per the feed contract. Returns
/// `None` for malformed XML, a missing tag, or an empty value.
pub fn extract_alert(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"lightningalert" => {
                let text = reader.read_text(e.name()).ok()?;
                let trimmed = text.trim();
                return if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str =
        r#"<?xml version="1.0"?><weather><lightningalert>RedAlert</lightningalert></weather>"#;

    fn utf16_bytes(text: &str, little_endian: bool, bom: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if bom {
            out.extend_from_slice(if little_endian {
                &[0xFF, 0xFE]
            } else {
                &[0xFE, 0xFF]
            });
        }
        for unit in text.encode_utf16() {
            out.extend_from_slice(&if little_endian {
                unit.to_le_bytes()
            } else {
                unit.to_be_bytes()
            });
        }
        out
    }

    // ── decode_body ──────────────────────────────────────────────────────────

    #[test]
    fn test_decode_body_utf8_passthrough() {
        let text = decode_body(FEED.as_bytes()).expect("decode");
        assert_eq!(text, FEED);
    }

    #[test]
    fn test_decode_body_utf16_le_with_bom() {
        let bytes = utf16_bytes(FEED, true, true);
        let text = decode_body(&bytes).expect("decode");
        assert_eq!(text, FEED);
    }

    #[test]
    fn test_decode_body_utf16_be_with_bom() {
        let bytes = utf16_bytes(FEED, false, true);
        let text = decode_body(&bytes).expect("decode");
        assert_eq!(text, FEED);
    }

    #[test]
    fn test_decode_body_utf16_le_without_bom_via_nul_sniff() {
        let bytes = utf16_bytes(FEED, true, false);
        let text = decode_body(&bytes).expect("decode");
        assert_eq!(text, FEED);
    }

    #[test]
    fn test_decode_body_nul_bytes_without_xml_falls_back_to_utf8() {
        // NUL-laden binary garbage that is not UTF-16 XML: the sniff decode
        // either fails or lacks "<?xml", so the lossy UTF-8 path wins.
        let bytes = vec![0x41, 0x00, 0x42, 0x00, 0x7F, 0x13];
        let text = decode_body(&bytes).expect("decode");
        assert!(text.contains('A'));
    }

    // ── extract_alert ────────────────────────────────────────────────────────

    #[test]
    fn test_extract_alert_returns_first_value() {
        let xml = r#"<w><lightningalert>Warning</lightningalert>
                     <lightningalert>AllClear</lightningalert></w>"#;
        assert_eq!(extract_alert(xml).as_deref(), Some("Warning"));
    }

    #[test]
    fn test_extract_alert_trims_whitespace() {
        let xml = "<w><lightningalert>\n  AllClear \n</lightningalert></w>";
        assert_eq!(extract_alert(xml).as_deref(), Some("AllClear"));
    }

    #[test]
    fn test_extract_alert_tag_is_case_sensitive() {
        let xml = "<w><LightningAlert>RedAlert</LightningAlert></w>";
        assert_eq!(extract_alert(xml), None);
    }

    #[test]
    fn test_extract_alert_missing_tag_is_none() {
        assert_eq!(extract_alert("<weather><temp>20</temp></weather>"), None);
    }

    #[test]
    fn test_extract_alert_empty_value_is_none() {
        assert_eq!(
            extract_alert("<w><lightningalert></lightningalert></w>"),
            None
        );
    }

    #[test]
    fn test_extract_alert_malformed_xml_is_none() {
        assert_eq!(extract_alert("<w><lightningalert>RedAlert"), None);
    }
}
