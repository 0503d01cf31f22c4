//! Adapter driving the local `gpg2` binary through [`signd_ipc`],
//! implementing [`SigningBackend`] (spec.md §4.1, §4.2, §4.4, §4.6).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use signd_ipc::{restart_gpg_agent, Gpg, KeyLock, PassphraseDb};
use signd_openpgp::DigestAlgorithm;

use crate::audit::{AuditLog, Status};
use crate::error::{Error, Result};
use crate::facade::{SigningBackend, UploadSource};
use crate::streaming::write_to_file_bounded;

pub struct GpgBackend {
    gpg: Gpg,
    passphrase_db: PassphraseDb,
    locks_dir: PathBuf,
    tmp_dir: PathBuf,
    max_upload_bytes: u64,
    audit: AuditLog,
}

impl GpgBackend {
    pub fn new(
        gpg: Gpg,
        passphrase_db: PassphraseDb,
        locks_dir: PathBuf,
        tmp_dir: PathBuf,
        max_upload_bytes: u64,
        audit: AuditLog,
    ) -> Self {
        Self { gpg, passphrase_db, locks_dir, tmp_dir, max_upload_bytes, audit }
    }

    fn require_key(&self, keyid: &str) -> Result<()> {
        if self.passphrase_db.key_exists(keyid) {
            Ok(())
        } else {
            Err(Error::UnknownKey(keyid.to_string()))
        }
    }
}

#[async_trait]
impl SigningBackend for GpgBackend {
    fn key_exists(&self, keyid: &str) -> bool {
        self.passphrase_db.key_exists(keyid)
    }

    fn list_keys(&self) -> Vec<String> {
        self.passphrase_db.list_keyids()
    }

    async fn sign(
        &self,
        keyid: &str,
        upload: UploadSource,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<String> {
        self.require_key(keyid)?;

        let dir = tempfile::Builder::new()
            .prefix("signd")
            .tempdir_in(&self.tmp_dir)
            .map_err(|e| Error::SigningFailed(e.into()))?;
        let input_path = dir.path().join(sanitize_filename(&upload.filename));
        write_to_file_bounded(upload.reader, &input_path, self.max_upload_bytes).await?;
        let pre_hash = hash_file(&input_path).await?;

        let keyid_owned = keyid.to_string();
        let passphrase = self.passphrase_db.passphrase(keyid).to_string();
        let digest_name = digest_algo.armor_name().to_string();
        let gpg = self.gpg.clone();
        let locks_dir = self.locks_dir.clone();
        let path_for_blocking = input_path.clone();

        let sign_result = tokio::task::spawn_blocking(move || {
            let _lock = KeyLock::acquire(&locks_dir, &keyid_owned)?;
            let result = gpg.sign(&keyid_owned, &passphrase, &digest_name, detached, &path_for_blocking);
            restart_gpg_agent();
            result
        })
        .await
        .map_err(|e| Error::SigningFailed(anyhow::anyhow!(e)))?;

        if let Err(e) = sign_result {
            self.audit.record_gpg(&upload.filename, &pre_hash, "", keyid, Status::Failed);
            return Err(e.into());
        }

        let post_hash = hash_file(&input_path).await?;
        let sig_path = append_extension(&input_path, "asc");
        let sig_content =
            tokio::fs::read_to_string(&sig_path).await.map_err(|e| Error::SigningFailed(e.into()))?;
        let _ = tokio::fs::remove_file(&sig_path).await;

        self.audit.record_gpg(&upload.filename, &pre_hash, &post_hash, keyid, Status::Success);
        Ok(sig_content)
    }

    /// Stages every file first, then takes the key lock once for the
    /// whole batch (the lock is not re-entrant — see `signd_ipc::lock`)
    /// and signs sequentially, stopping at the first failure so no
    /// file past it is ever touched (spec.md §4.4, §8 property 7).
    ///
    /// Staging itself can fail partway through (e.g. an oversize file
    /// further down the batch), before any file has reached `gpg2`.
    /// When that happens no file in this batch was ever submitted to
    /// the backend, so none gets a SUCCESS record — only the file that
    /// triggered the staging failure is audited, as FAILED. This is a
    /// weaker audit trail than the per-file sign-then-audit loop below
    /// produces (which logs file 1 SUCCESS before file 2 fails), but
    /// staging every file up front is what lets the per-key lock be
    /// acquired exactly once for the whole batch instead of
    /// re-acquired per file; spec.md §3's invariant only requires an
    /// audit record per *signing attempt*, and a file that failed
    /// staging was never attempted.
    async fn sign_batch(
        &self,
        keyid: &str,
        uploads: Vec<UploadSource>,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<Vec<(String, String)>> {
        if uploads.is_empty() {
            return Err(Error::EmptyBatch);
        }
        self.require_key(keyid)?;

        let dir = tempfile::Builder::new()
            .prefix("signd-batch")
            .tempdir_in(&self.tmp_dir)
            .map_err(|e| Error::SigningFailed(e.into()))?;

        let mut staged = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let path = dir.path().join(sanitize_filename(&upload.filename));
            if let Err(e) = write_to_file_bounded(upload.reader, &path, self.max_upload_bytes).await {
                self.audit.record_gpg(&upload.filename, "", "", keyid, Status::Failed);
                return Err(e);
            }
            let pre_hash = match hash_file(&path).await {
                Ok(hash) => hash,
                Err(e) => {
                    self.audit.record_gpg(&upload.filename, "", "", keyid, Status::Failed);
                    return Err(e);
                }
            };
            staged.push((upload.filename, path, pre_hash));
        }

        let keyid_owned = keyid.to_string();
        let passphrase = self.passphrase_db.passphrase(keyid).to_string();
        let digest_name = digest_algo.armor_name().to_string();
        let gpg = self.gpg.clone();
        let locks_dir = self.locks_dir.clone();
        let staged_for_blocking = staged.clone();

        let outcomes = tokio::task::spawn_blocking(move || {
            let _lock = KeyLock::acquire(&locks_dir, &keyid_owned)?;
            let mut outcomes = Vec::with_capacity(staged_for_blocking.len());
            for (_, path, _) in &staged_for_blocking {
                let result = gpg.sign(&keyid_owned, &passphrase, &digest_name, detached, path);
                restart_gpg_agent();
                let failed = result.is_err();
                outcomes.push(result);
                if failed {
                    break;
                }
            }
            Ok::<_, signd_ipc::Error>(outcomes)
        })
        .await
        .map_err(|e| Error::SigningFailed(anyhow::anyhow!(e)))??;

        let mut results = Vec::with_capacity(outcomes.len());
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let (filename, path, pre_hash) = &staged[i];
            match outcome {
                Ok(()) => {
                    let post_hash = hash_file(path).await?;
                    let sig_path = append_extension(path, "asc");
                    let sig_content = tokio::fs::read_to_string(&sig_path)
                        .await
                        .map_err(|e| Error::SigningFailed(e.into()))?;
                    let _ = tokio::fs::remove_file(&sig_path).await;
                    self.audit.record_gpg(filename, pre_hash, &post_hash, keyid, Status::Success);
                    results.push((filename.clone(), sig_content));
                }
                Err(e) => {
                    self.audit.record_gpg(filename, pre_hash, "", keyid, Status::Failed);
                    return Err(e.into());
                }
            }
        }
        Ok(results)
    }
}

fn sanitize_filename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "upload".to_string())
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

async fn hash_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| Error::SigningFailed(e.into()))?;
    Ok(hash_bytes(&bytes))
}

fn hash_bytes(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_filename_strips_directory_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn sanitize_filename_falls_back_when_empty() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("."), "upload");
    }

    #[test]
    fn append_extension_adds_suffix_to_full_path() {
        let path = Path::new("/tmp/signd/file");
        assert_eq!(append_extension(path, "asc"), PathBuf::from("/tmp/signd/file.asc"));
    }

    #[test]
    fn hash_bytes_is_deterministic_sha256() {
        let a = hash_bytes(b"hello");
        let b = hash_bytes(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
