#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Key not found: {0}")]
    KeyNotFound(String),
    #[error("Invalid KMS key: {key_id}")]
    InvalidKey { key_id: String, #[source] source: anyhow::Error },
    #[error("No GPG fingerprint configured for KMS key: {key_id}")]
    MissingFingerprint { key_id: String },
    #[error("file size {size} exceeds limit {limit} bytes")]
    FileTooBig { size: u64, limit: u64 },
    #[error("failed to build signature packet: {0}")]
    PacketBuild(String),
    #[error("KMS signing failed: {0}")]
    SigningFailed(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
