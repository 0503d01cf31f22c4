//! Cleartext Signed Message framing (RFC 4880 §7).

use crate::text::decode_lenient;

/// Dash-escapes any line that begins with `-` by prefixing `- `. Only
/// splits and rejoins on `\n`, so any `\r` already attached to a line
/// ending is preserved verbatim (spec.md §4.3, §8 property 6).
pub fn dash_escape(text: &str) -> String {
    text.split('\n')
        .map(|line| if line.starts_with('-') { format!("- {line}") } else { line.to_string() })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Frames a cleartext signed message: header, `Hash:` line, a blank
/// line, the dash-escaped (but otherwise unnormalized) document, then
/// the caller-supplied armored signature block.
pub fn frame(content: &[u8], hash_algo_name: &str, armored_signature: &str) -> String {
    let text = decode_lenient(content);
    let escaped = dash_escape(&text);
    let escaped = escaped.strip_suffix('\n').unwrap_or(&escaped);
    format!(
        "-----BEGIN PGP SIGNED MESSAGE-----\nHash: {hash_algo_name}\n\n{escaped}\n{armored_signature}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_non_dashed_lines_unchanged() {
        let text = "line one\nline two\nline three";
        assert_eq!(dash_escape(text), text);
    }

    #[test]
    fn escapes_dashed_lines_only() {
        let text = "-dash\nline2\n-- also dashed";
        assert_eq!(dash_escape(text), "- -dash\nline2\n- -- also dashed");
    }

    #[test]
    fn frame_matches_scenario_s6_shape() {
        let framed = frame(b"-dash\nline2\n", "SHA256", "-----BEGIN PGP SIGNATURE-----\n...\n-----END PGP SIGNATURE-----\n");
        let mut lines = framed.lines();
        assert_eq!(lines.next(), Some("-----BEGIN PGP SIGNED MESSAGE-----"));
        assert_eq!(lines.next(), Some("Hash: SHA256"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("- -dash"));
        assert_eq!(lines.next(), Some("line2"));
        assert_eq!(lines.next(), Some("-----BEGIN PGP SIGNATURE-----"));
    }
}
