/// Hash algorithms usable for a signature, keyed by their RFC 4880
/// §9.4 algorithm id.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// RFC 4880 §9.4 hash algorithm id.
    pub fn id(self) -> u8 {
        match self {
            DigestAlgorithm::Sha256 => 8,
            DigestAlgorithm::Sha384 => 9,
            DigestAlgorithm::Sha512 => 10,
        }
    }

    /// The name as it appears in a cleartext message's `Hash:` header.
    pub fn armor_name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
        }
    }

    /// Parses a digest algorithm name the way the original service
    /// did: case-insensitively, by substring match, falling back to
    /// SHA-256 for anything unrecognized rather than failing.
    pub fn parse_lenient(name: &str) -> Self {
        let upper = name.to_uppercase().replace('_', "");
        if upper.contains("SHA384") {
            DigestAlgorithm::Sha384
        } else if upper.contains("SHA512") {
            DigestAlgorithm::Sha512
        } else {
            DigestAlgorithm::Sha256
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        use sha2::{Digest, Sha256, Sha384, Sha512};
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// The kind of content a signature covers (RFC 4880 §5.2.1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignatureType {
    /// `0x00`, signs the document's raw bytes.
    Binary,
    /// `0x01`, signs the document after canonical text normalization.
    CanonicalText,
}

impl SignatureType {
    pub fn value(self) -> u8 {
        match self {
            SignatureType::Binary => 0x00,
            SignatureType::CanonicalText => 0x01,
        }
    }

    pub fn for_detached(detached: bool) -> Self {
        if detached {
            SignatureType::Binary
        } else {
            SignatureType::CanonicalText
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lenient_matches_substrings() {
        assert_eq!(DigestAlgorithm::parse_lenient("sha384"), DigestAlgorithm::Sha384);
        assert_eq!(DigestAlgorithm::parse_lenient("SHA_512"), DigestAlgorithm::Sha512);
        assert_eq!(DigestAlgorithm::parse_lenient("md5"), DigestAlgorithm::Sha256);
        assert_eq!(DigestAlgorithm::parse_lenient(""), DigestAlgorithm::Sha256);
    }

    #[test]
    fn ids_match_rfc4880() {
        assert_eq!(DigestAlgorithm::Sha256.id(), 8);
        assert_eq!(DigestAlgorithm::Sha384.id(), 9);
        assert_eq!(DigestAlgorithm::Sha512.id(), 10);
    }
}
