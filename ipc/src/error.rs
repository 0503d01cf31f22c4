#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("PGP key {0} is not found in the gnupg2 database")]
    KeyNotFound(String),
    #[error("PGP key {0} password is not valid")]
    InvalidPassphrase(String),
    #[error("development mode requires a development PGP password")]
    MissingDevelopmentPassphrase,
    #[error("gpg2 failed to sign file, error: {output}")]
    SigningFailed { output: String },
    #[error("failed to acquire lock for key {keyid}: {source}")]
    Lock { keyid: String, #[source] source: std::io::Error },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
