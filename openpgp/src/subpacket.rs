//! Hashed/unhashed signature subpacket area construction (RFC 4880
//! §5.2.3.1). Only the two subpackets this service emits are
//! implemented: signature creation time and issuer key id.

const TAG_SIGNATURE_CREATION_TIME: u8 = 2;
const TAG_ISSUER_KEY_ID: u8 = 16;

/// Wraps a subpacket body with its RFC 4880 one-byte length prefix
/// (`len(body) + 1`, the `+1` accounting for the type octet itself).
fn length_prefixed(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 2);
    out.push((body.len() + 1) as u8);
    out.push(tag);
    out.extend_from_slice(body);
    out
}

pub fn creation_time_subpacket(unix_seconds: u32) -> Vec<u8> {
    length_prefixed(TAG_SIGNATURE_CREATION_TIME, &unix_seconds.to_be_bytes())
}

/// `fingerprint` is the full 20-byte v4 fingerprint; only its last 8
/// bytes (the key id) are stored in the subpacket.
pub fn issuer_key_id_subpacket(fingerprint: &[u8; 20]) -> Vec<u8> {
    length_prefixed(TAG_ISSUER_KEY_ID, &fingerprint[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_time_subpacket_is_six_bytes() {
        let sp = creation_time_subpacket(0x6123_4567);
        assert_eq!(sp, vec![5, 2, 0x61, 0x23, 0x45, 0x67]);
    }

    #[test]
    fn issuer_key_id_uses_last_eight_bytes_of_fingerprint() {
        let mut fp = [0u8; 20];
        for (i, b) in fp.iter_mut().enumerate() {
            *b = i as u8;
        }
        let sp = issuer_key_id_subpacket(&fp);
        assert_eq!(sp[0], 17); // len(body)+1 = 16+1
        assert_eq!(sp[1], 16); // tag
        assert_eq!(&sp[2..], &fp[12..]);
    }
}
