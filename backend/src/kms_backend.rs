//! Adapter from [`signd_kms::Kms`] to the [`SigningBackend`] trait
//! (spec.md §4.5, §4.6).

use async_trait::async_trait;
use signd_openpgp::DigestAlgorithm;
use sha2::{Digest, Sha256};
use signd_kms::Kms;

use crate::audit::{AuditLog, Status};
use crate::error::Result;
use crate::facade::{SigningBackend, UploadSource};
use crate::streaming::read_to_vec_bounded;

pub struct KmsBackend {
    kms: Kms,
    max_upload_bytes: u64,
    audit: AuditLog,
}

impl KmsBackend {
    pub fn new(kms: Kms, max_upload_bytes: u64, audit: AuditLog) -> Self {
        Self { kms, max_upload_bytes, audit }
    }
}

#[async_trait]
impl SigningBackend for KmsBackend {
    fn key_exists(&self, keyid: &str) -> bool {
        self.kms.key_exists(keyid)
    }

    fn list_keys(&self) -> Vec<String> {
        self.kms.list_keys()
    }

    async fn sign(
        &self,
        keyid: &str,
        upload: UploadSource,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<String> {
        let filename = upload.filename;
        let content = read_to_vec_bounded(upload.reader, self.max_upload_bytes).await?;
        let pre_hash = hex(&Sha256::digest(&content));

        match self.kms.sign(keyid, &content, detached, digest_algo, false).await {
            Ok(signature) => {
                self.audit.record_kms(&filename, Some(&pre_hash), keyid, Status::Success);
                Ok(signature)
            }
            Err(e) => {
                self.audit.record_kms(&filename, Some(&pre_hash), keyid, Status::Failed);
                Err(e.into())
            }
        }
    }

    async fn sign_batch(
        &self,
        keyid: &str,
        uploads: Vec<UploadSource>,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<Vec<(String, String)>> {
        let mut files = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let content = read_to_vec_bounded(upload.reader, self.max_upload_bytes).await?;
            files.push((upload.filename, content));
        }

        let hashes: Vec<(String, String)> =
            files.iter().map(|(name, content)| (name.clone(), hex(&Sha256::digest(content)))).collect();

        match self.kms.sign_batch(keyid, files, detached, digest_algo).await {
            Ok(results) => {
                for (filename, pre_hash) in &hashes {
                    self.audit.record_kms(filename, Some(pre_hash), keyid, Status::Success);
                }
                Ok(results)
            }
            Err(e) => {
                for (filename, pre_hash) in &hashes {
                    self.audit.record_kms(filename, Some(pre_hash), keyid, Status::Failed);
                }
                Err(e.into())
            }
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
