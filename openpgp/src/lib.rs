//! RFC 4880 signature hashing, packet serialization and ASCII armor.
//!
//! This crate implements only the subset of OpenPGP needed by the
//! signing service: computing the hash a v4 signature is made over,
//! building the signature packet from a raw RSA signature value, and
//! framing the result as ASCII-armored or cleartext-signed output.
//! It does not parse or verify arbitrary OpenPGP messages.

mod types;
mod text;
mod subpacket;
mod mpi;
mod signature;
pub mod armor;
pub mod cleartext;

pub use types::{DigestAlgorithm, SignatureType};
pub use text::{canonicalize_text, decode_lenient};
pub use signature::{SignatureHash, SignaturePacket, compute_signature_hash};
pub use mpi::mpi_encode;

/// Errors produced while building or framing a signature.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("fingerprint must be 20 bytes, got {0}")]
    BadFingerprintLength(usize),
    #[error("signature value must not be empty")]
    EmptySignature,
    #[error("armor input is malformed: {0}")]
    Armor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
