//! The uniform `SigningBackend` interface and the process-wide,
//! one-shot-initialized facade that selects between the GPG and KMS
//! implementations (spec.md §4.6).

use std::pin::Pin;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use signd_openpgp::DigestAlgorithm;
use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::gpg_backend::GpgBackend;
use crate::kms_backend::KmsBackend;

/// One file awaiting a signature: a name for audit/response purposes
/// and an async byte source the backend streams from.
pub struct UploadSource {
    pub filename: String,
    pub reader: Pin<Box<dyn AsyncRead + Send + Unpin>>,
}

#[async_trait]
pub trait SigningBackend: Send + Sync {
    fn key_exists(&self, keyid: &str) -> bool;
    fn list_keys(&self) -> Vec<String>;

    async fn sign(
        &self,
        keyid: &str,
        upload: UploadSource,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<String>;

    async fn sign_batch(
        &self,
        keyid: &str,
        uploads: Vec<UploadSource>,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<Vec<(String, String)>>;
}

/// Tagged variant behind the facade (spec.md §4.6, §9: "abstract
/// class + singleton backend" becomes a tagged enum behind an
/// interface).
pub enum Backend {
    Gpg(GpgBackend),
    Kms(KmsBackend),
}

#[async_trait]
impl SigningBackend for Backend {
    fn key_exists(&self, keyid: &str) -> bool {
        match self {
            Backend::Gpg(b) => b.key_exists(keyid),
            Backend::Kms(b) => b.key_exists(keyid),
        }
    }

    fn list_keys(&self) -> Vec<String> {
        match self {
            Backend::Gpg(b) => b.list_keys(),
            Backend::Kms(b) => b.list_keys(),
        }
    }

    async fn sign(
        &self,
        keyid: &str,
        upload: UploadSource,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<String> {
        match self {
            Backend::Gpg(b) => b.sign(keyid, upload, detached, digest_algo).await,
            Backend::Kms(b) => b.sign(keyid, upload, detached, digest_algo).await,
        }
    }

    async fn sign_batch(
        &self,
        keyid: &str,
        uploads: Vec<UploadSource>,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<Vec<(String, String)>> {
        match self {
            Backend::Gpg(b) => b.sign_batch(keyid, uploads, detached, digest_algo).await,
            Backend::Kms(b) => b.sign_batch(keyid, uploads, detached, digest_algo).await,
        }
    }
}

static INSTANCE: OnceCell<Backend> = OnceCell::new();

/// Installs the process-wide backend. Must be called exactly once,
/// at startup; switching backends requires a process restart
/// (spec.md §4.6, §5 "Shared state").
pub fn install(backend: Backend) -> Result<()> {
    INSTANCE
        .set(backend)
        .map_err(|_| Error::Configuration("signing backend already initialized".into()))
}

/// Returns the installed backend.
///
/// # Panics
/// Panics if [`install`] has not been called yet; every caller is
/// reached only after startup has installed a backend.
pub fn global() -> &'static Backend {
    INSTANCE.get().expect("signing backend not installed")
}
