//! Signature hash computation (RFC 4880 §5.2.4) and v4 signature
//! packet serialization (RFC 4880 §5.2.3).

use crate::mpi::mpi_encode;
use crate::subpacket::{creation_time_subpacket, issuer_key_id_subpacket};
use crate::text::canonicalize_text;
use crate::types::{DigestAlgorithm, SignatureType};
use crate::{Error, Result};

const VERSION: u8 = 4;
const PUBKEY_ALGO_RSA: u8 = 1;
/// Tag 2 (signature), new packet format.
const PACKET_TAG_SIGNATURE: u8 = 0xC2;

/// Everything needed to both compute the digest a signer must sign
/// and, later, to build the packet around the resulting raw
/// signature value.
#[derive(Clone, Debug)]
pub struct SignatureHash {
    pub sig_type: SignatureType,
    pub hash_algo: DigestAlgorithm,
    pub creation_time: u32,
    pub fingerprint: [u8; 20],
    pub hashed_subpackets: Vec<u8>,
    pub digest: Vec<u8>,
}

/// Builds the signature trailer (RFC 4880 §5.2.4): version, sig type,
/// pubkey algo, hash algo, and the length-prefixed hashed subpacket
/// area.
fn signature_trailer(sig_type: SignatureType, hash_algo: DigestAlgorithm, hashed_subpackets: &[u8]) -> Vec<u8> {
    let mut trailer = vec![VERSION, sig_type.value(), PUBKEY_ALGO_RSA, hash_algo.id()];
    trailer.extend_from_slice(&(hashed_subpackets.len() as u16).to_be_bytes());
    trailer.extend_from_slice(hashed_subpackets);
    trailer
}

/// The final trailer appended after the signature trailer to bind the
/// hash to "this is a v4 signature of this many trailer bytes"
/// (RFC 4880 §5.2.4).
fn final_trailer(trailer_len: usize) -> Vec<u8> {
    let mut out = vec![VERSION, 0xFF];
    out.extend_from_slice(&(trailer_len as u32).to_be_bytes());
    out
}

/// Computes the digest that must be signed for `content`, per
/// spec.md §4.3. `fingerprint` is the full 20-byte v4 fingerprint of
/// the signing key; its low 8 bytes become the issuer key id
/// subpacket.
pub fn compute_signature_hash(
    content: &[u8],
    detached: bool,
    digest_algo: DigestAlgorithm,
    creation_time: u32,
    fingerprint: &[u8; 20],
) -> SignatureHash {
    let sig_type = SignatureType::for_detached(detached);
    let hash_input: std::borrow::Cow<[u8]> = if detached {
        std::borrow::Cow::Borrowed(content)
    } else {
        std::borrow::Cow::Owned(canonicalize_text(content))
    };

    let hashed_subpackets = {
        let mut sp = creation_time_subpacket(creation_time);
        sp.extend_from_slice(&issuer_key_id_subpacket(fingerprint));
        sp
    };

    let trailer = signature_trailer(sig_type, digest_algo, &hashed_subpackets);
    let final_trailer = final_trailer(trailer.len());

    let mut preimage = Vec::with_capacity(hash_input.len() + trailer.len() + final_trailer.len());
    preimage.extend_from_slice(&hash_input);
    preimage.extend_from_slice(&trailer);
    preimage.extend_from_slice(&final_trailer);
    let digest = digest_algo.digest(&preimage);

    SignatureHash {
        sig_type,
        hash_algo: digest_algo,
        creation_time,
        fingerprint: *fingerprint,
        hashed_subpackets,
        digest,
    }
}

/// A fully built v4 signature packet, ready to be serialized and
/// armored. Built from a [`SignatureHash`] plus the raw signature
/// value a backend produced for its digest.
pub struct SignaturePacket {
    hash: SignatureHash,
    signature_value: Vec<u8>,
}

impl SignaturePacket {
    pub fn new(hash: SignatureHash, signature_value: Vec<u8>) -> Result<Self> {
        if signature_value.is_empty() {
            return Err(Error::EmptySignature);
        }
        Ok(Self { hash, signature_value })
    }

    /// Serializes the packet body (everything after the packet
    /// header): version, sig type, pubkey algo, hash algo, hashed and
    /// unhashed subpacket areas, the two-byte digest-prefix
    /// quick-check, and the signature MPI.
    fn body(&self) -> Vec<u8> {
        let unhashed_subpackets = issuer_key_id_subpacket(&self.hash.fingerprint);

        let mut body = vec![VERSION, self.hash.sig_type.value(), PUBKEY_ALGO_RSA, self.hash.hash_algo.id()];
        body.extend_from_slice(&(self.hash.hashed_subpackets.len() as u16).to_be_bytes());
        body.extend_from_slice(&self.hash.hashed_subpackets);
        body.extend_from_slice(&(unhashed_subpackets.len() as u16).to_be_bytes());
        body.extend_from_slice(&unhashed_subpackets);
        body.extend_from_slice(&self.hash.digest[..2]);
        body.extend_from_slice(&mpi_encode(&self.signature_value));
        body
    }

    /// Serializes the full packet, including its new-format header
    /// (RFC 4880 §4.2.2).
    pub fn serialize(&self) -> Vec<u8> {
        let body = self.body();
        let mut out = Vec::with_capacity(body.len() + 5);
        out.push(PACKET_TAG_SIGNATURE);
        out.extend_from_slice(&encode_new_format_length(body.len()));
        out.extend_from_slice(&body);
        out
    }
}

fn encode_new_format_length(len: usize) -> Vec<u8> {
    if len < 192 {
        vec![len as u8]
    } else if len < 8384 {
        let len = len - 192;
        vec![((len >> 8) + 192) as u8, (len & 0xFF) as u8]
    } else {
        let mut out = vec![0xFFu8];
        out.extend_from_slice(&(len as u32).to_be_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp() -> [u8; 20] {
        let mut fp = [0u8; 20];
        for (i, b) in fp.iter_mut().enumerate() {
            *b = 0x10 + i as u8;
        }
        fp
    }

    #[test]
    fn digest_determinism() {
        let a = compute_signature_hash(b"hello\n", true, DigestAlgorithm::Sha256, 1_700_000_000, &fp());
        let b = compute_signature_hash(b"hello\n", true, DigestAlgorithm::Sha256, 1_700_000_000, &fp());
        assert_eq!(a.digest, b.digest);
    }

    #[test]
    fn digest_changes_with_detached_flag() {
        let detached = compute_signature_hash(b"hello\n", true, DigestAlgorithm::Sha256, 1_700_000_000, &fp());
        let cleartext = compute_signature_hash(b"hello\n", false, DigestAlgorithm::Sha256, 1_700_000_000, &fp());
        assert_ne!(detached.digest, cleartext.digest);
        assert_eq!(detached.sig_type, SignatureType::Binary);
        assert_eq!(cleartext.sig_type, SignatureType::CanonicalText);
    }

    #[test]
    fn packet_carries_expected_fixed_fields() {
        let hash = compute_signature_hash(b"hello\n", true, DigestAlgorithm::Sha256, 1_700_000_000, &fp());
        let packet = SignaturePacket::new(hash, vec![0x01, 0x23]).unwrap();
        let bytes = packet.serialize();
        assert_eq!(bytes[0], PACKET_TAG_SIGNATURE);
        // header is one length byte since body is short
        assert_eq!(bytes[2], VERSION);
        assert_eq!(bytes[3], SignatureType::Binary.value());
        assert_eq!(bytes[4], PUBKEY_ALGO_RSA);
        assert_eq!(bytes[5], DigestAlgorithm::Sha256.id());
    }

    #[test]
    fn rejects_empty_signature_value() {
        let hash = compute_signature_hash(b"hello\n", true, DigestAlgorithm::Sha256, 1_700_000_000, &fp());
        assert!(SignaturePacket::new(hash, vec![]).is_err());
    }

    #[test]
    fn new_format_length_boundaries() {
        assert_eq!(encode_new_format_length(10), vec![10]);
        assert_eq!(encode_new_format_length(191), vec![191]);
        assert_eq!(encode_new_format_length(192), vec![192, 0]);
        assert_eq!(encode_new_format_length(8383), vec![255, 191]);
        assert_eq!(encode_new_format_length(8384)[0], 0xFF);
    }
}
