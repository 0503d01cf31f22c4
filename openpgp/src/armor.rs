//! ASCII Armor (RFC 4880 §6): Radix-64 framing of binary OpenPGP
//! data with a CRC-24 checksum.
//!
//! This module implements only the `SIGNATURE` armor kind, which is
//! the only one this service ever emits.

use base64::Engine;

const LINE_LENGTH: usize = 64;
const CRC24_INIT: u32 = 0xB704CE;
const CRC24_POLY: u32 = 0x1864CFB;

fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= (byte as u32) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// ASCII-armors `body` as a detached `PGP SIGNATURE` block.
pub fn armor_signature(body: &[u8]) -> String {
    let engine = base64::engine::general_purpose::STANDARD;
    let encoded = engine.encode(body);

    let mut out = String::from("-----BEGIN PGP SIGNATURE-----\n\n");
    for chunk in encoded.as_bytes().chunks(LINE_LENGTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 is ASCII"));
        out.push('\n');
    }
    let crc = crc24(body);
    let crc_bytes = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];
    out.push('=');
    out.push_str(&engine.encode(crc_bytes));
    out.push('\n');
    out.push_str("-----END PGP SIGNATURE-----\n");
    out
}

/// Recovers the original packet bytes from an armored block produced
/// by [`armor_signature`], verifying the CRC-24 along the way. Used
/// only by tests to check the armor round-trip property (spec.md §8,
/// property 5).
pub fn dearmor_signature(armored: &str) -> crate::Result<Vec<u8>> {
    let mut lines = armored.lines();
    let header = lines
        .find(|l| l.starts_with("-----BEGIN PGP SIGNATURE-----"))
        .ok_or_else(|| crate::Error::Armor("missing BEGIN header".into()))?;
    let _ = header;

    let mut body_b64 = String::new();
    let mut crc_line: Option<&str> = None;
    for line in lines {
        if line.starts_with("-----END PGP SIGNATURE-----") {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('=') {
            if rest.len() == 4 {
                crc_line = Some(rest);
                continue;
            }
        }
        body_b64.push_str(line);
    }

    let engine = base64::engine::general_purpose::STANDARD;
    let body = engine
        .decode(body_b64.as_bytes())
        .map_err(|e| crate::Error::Armor(e.to_string()))?;

    if let Some(crc_b64) = crc_line {
        let crc_bytes = engine
            .decode(crc_b64.as_bytes())
            .map_err(|e| crate::Error::Armor(e.to_string()))?;
        if crc_bytes.len() != 3 {
            return Err(crate::Error::Armor("CRC must be 3 bytes".into()));
        }
        let expected = ((crc_bytes[0] as u32) << 16) | ((crc_bytes[1] as u32) << 8) | crc_bytes[2] as u32;
        if expected != crc24(&body) {
            return Err(crate::Error::Armor("CRC-24 mismatch".into()));
        }
    } else {
        return Err(crate::Error::Armor("missing CRC-24 line".into()));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn armor_has_expected_framing() {
        let armored = armor_signature(b"hello world");
        assert!(armored.starts_with("-----BEGIN PGP SIGNATURE-----\n\n"));
        assert!(armored.ends_with("-----END PGP SIGNATURE-----\n"));
    }

    #[test]
    fn round_trip_recovers_original_bytes() {
        let original = b"a fairly short signature body".to_vec();
        let armored = armor_signature(&original);
        let recovered = dearmor_signature(&armored).unwrap();
        assert_eq!(recovered, original);
    }

    #[test]
    fn wraps_long_bodies_at_64_characters() {
        let original = vec![0x42u8; 200];
        let armored = armor_signature(&original);
        for line in armored.lines().skip(2) {
            if line.starts_with("-----") || line.starts_with('=') {
                break;
            }
            assert!(line.len() <= LINE_LENGTH);
        }
    }

    quickcheck! {
        fn prop_armor_round_trip(body: Vec<u8>) -> bool {
            let armored = armor_signature(&body);
            dearmor_signature(&armored).map(|d| d == body).unwrap_or(false)
        }
    }
}
