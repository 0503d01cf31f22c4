//! The error taxonomy from spec.md §7. Only the HTTP boundary
//! (in the `service` crate) translates these into wire responses;
//! every layer below bubbles them unchanged.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key {0} does not exist")]
    UnknownKey(String),
    #[error("file size exceeds {limit} bytes")]
    FileTooBig { limit: u64 },
    #[error("no files provided for signing")]
    EmptyBatch,
    #[error("signing failed")]
    SigningFailed(#[source] anyhow::Error),
    #[error("operation canceled")]
    Canceled,
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<signd_ipc::Error> for Error {
    fn from(e: signd_ipc::Error) -> Self {
        match e {
            signd_ipc::Error::KeyNotFound(k) => Error::UnknownKey(k),
            other => Error::SigningFailed(other.into()),
        }
    }
}

impl From<signd_kms::Error> for Error {
    fn from(e: signd_kms::Error) -> Self {
        match e {
            signd_kms::Error::KeyNotFound(k) => Error::UnknownKey(k),
            signd_kms::Error::FileTooBig { limit, .. } => Error::FileTooBig { limit },
            other => Error::SigningFailed(other.into()),
        }
    }
}
