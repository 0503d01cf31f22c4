//! Canonical text normalization used when hashing a non-detached
//! (cleartext) signature (RFC 4880 §5.2.1).

/// Decodes `content` as UTF-8, falling back to treating each byte as
/// a Latin-1 code point on decode failure.
pub fn decode_lenient(content: &[u8]) -> String {
    match std::str::from_utf8(content) {
        Ok(s) => s.to_string(),
        Err(_) => content.iter().map(|&b| b as char).collect(),
    }
}

/// Decodes `content` (lenient, see [`decode_lenient`]), normalizes
/// line endings to `\n`, right-strips each line and rejoins with
/// `\r\n`, then re-encodes as UTF-8.
///
/// This is the hash input only; the document bytes handed back to the
/// caller (cleartext framing) are never altered by this function.
pub fn canonicalize_text(content: &[u8]) -> Vec<u8> {
    let text = decode_lenient(content);
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').map(|l| l.trim_end()).collect();
    lines.join("\r\n").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_line_endings_and_trailing_whitespace() {
        let input = b"line one  \nline two\t\nline three";
        let got = canonicalize_text(input);
        assert_eq!(got, b"line one\r\nline two\r\nline three".to_vec());
    }

    #[test]
    fn leaves_already_canonical_text_unchanged_in_content() {
        // Canonicalization only touches the hash input; verify it is
        // idempotent for text that needs no normalization.
        let input = b"no trailing whitespace\r\nhere";
        let got = canonicalize_text(input);
        assert_eq!(got, b"no trailing whitespace\r\nhere".to_vec());
    }

    #[test]
    fn falls_back_to_latin1_on_bad_utf8() {
        let input = [0xFF, 0x41];
        let got = canonicalize_text(&input);
        // 0xFF round-trips through latin-1 as U+00FF, re-encoded as
        // its two-byte UTF-8 form; the important property is that we
        // don't panic and 'A' survives as the last byte.
        assert!(got.ends_with(b"A"));
        assert_eq!(got.len(), 3);
    }
}
