//! Remote key-management signing backend (spec.md §4.5).
//!
//! Produces OpenPGP-compatible signatures from a raw RSA signature
//! value a remote KMS returns, so verifiers cannot tell the output
//! apart from a local `gpg2`-produced one.

mod error;

pub use error::{Error, Result};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use aws_sdk_kms::config::{retry::RetryConfig, BehaviorVersion};
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::{KeyState, MessageType, SigningAlgorithmSpec};
use aws_sdk_kms::Client;
use base64::Engine;
use signd_openpgp::{armor, cleartext, compute_signature_hash, DigestAlgorithm, SignaturePacket};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Configuration for [`Kms::init`].
pub struct KmsConfig {
    pub key_ids: Vec<String>,
    pub gpg_fingerprints: HashMap<String, String>,
    pub region: Option<String>,
    pub signing_algorithm: String,
    pub max_upload_bytes: u64,
    pub max_workers: usize,
}

pub struct Kms {
    client: Client,
    key_ids: Vec<String>,
    gpg_fingerprints: HashMap<String, String>,
    signing_algorithm: String,
    max_upload_bytes: u64,
    workers: Arc<Semaphore>,
}

impl Kms {
    /// Validates every configured key against the remote service
    /// (warns, does not fail, on a non-`Enabled` state; fails init if
    /// the call itself errors) and configures a client with 3
    /// adaptive retries, matching spec.md §4.5.
    pub async fn init(config: KmsConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::adaptive().with_max_attempts(3));
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_sdk_kms::config::Region::new(region));
        }
        let shared_config = loader.load().await;
        let client = Client::new(&shared_config);

        for key_id in &config.key_ids {
            let described = client
                .describe_key()
                .key_id(key_id)
                .send()
                .await
                .map_err(|e| Error::InvalidKey { key_id: key_id.clone(), source: anyhow::anyhow!(e) })?;
            if let Some(metadata) = described.key_metadata() {
                if metadata.key_state() != Some(&KeyState::Enabled) {
                    tracing::warn!(key_id, state = ?metadata.key_state(), "KMS key is not enabled");
                }
            }
        }

        Ok(Self {
            client,
            key_ids: config.key_ids,
            gpg_fingerprints: config.gpg_fingerprints,
            signing_algorithm: config.signing_algorithm,
            max_upload_bytes: config.max_upload_bytes,
            workers: Arc::new(Semaphore::new(config.max_workers.max(1))),
        })
    }

    pub fn key_exists(&self, keyid: &str) -> bool {
        self.key_ids.iter().any(|k| k == keyid)
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.key_ids.clone()
    }

    fn fingerprint(&self, keyid: &str) -> Result<[u8; 20]> {
        let hex = self
            .gpg_fingerprints
            .get(keyid)
            .ok_or_else(|| Error::MissingFingerprint { key_id: keyid.to_string() })?;
        parse_fingerprint(hex).ok_or_else(|| Error::MissingFingerprint { key_id: keyid.to_string() })
    }

    /// Signs `content` with `keyid`.
    ///
    /// `raw_signature` bypasses the OpenPGP hash pipeline entirely,
    /// returning a base64 signature over the content's plain digest.
    /// This is preserved for API completeness but, per spec.md §9's
    /// Open Question, is never routed through an HTTP endpoint.
    pub async fn sign(
        &self,
        keyid: &str,
        content: &[u8],
        detached: bool,
        digest_algo: DigestAlgorithm,
        raw_signature: bool,
    ) -> Result<String> {
        if !self.key_exists(keyid) {
            return Err(Error::KeyNotFound(keyid.to_string()));
        }
        if content.len() as u64 > self.max_upload_bytes {
            return Err(Error::FileTooBig { size: content.len() as u64, limit: self.max_upload_bytes });
        }

        let _permit = self.workers.acquire().await.expect("semaphore is never closed");

        if raw_signature {
            let digest = digest_algo.digest(content);
            let raw = self.sign_digest(keyid, &digest).await?;
            return Ok(base64::engine::general_purpose::STANDARD.encode(raw));
        }

        let fingerprint = self.fingerprint(keyid)?;
        let creation_time = unix_now();
        let hash = compute_signature_hash(content, detached, digest_algo, creation_time, &fingerprint);
        let raw_signature_value = self.sign_digest(keyid, &hash.digest).await?;
        let packet = SignaturePacket::new(hash, raw_signature_value)
            .map_err(|e| Error::PacketBuild(e.to_string()))?;
        let armored = armor::armor_signature(&packet.serialize());

        if detached {
            Ok(armored)
        } else {
            Ok(cleartext::frame(content, digest_algo.armor_name(), &armored))
        }
    }

    async fn sign_digest(&self, keyid: &str, digest: &[u8]) -> Result<Vec<u8>> {
        let algo = signing_algorithm_spec(&self.signing_algorithm);
        let response = self
            .client
            .sign()
            .key_id(keyid)
            .message(Blob::new(digest.to_vec()))
            .message_type(MessageType::Digest)
            .signing_algorithm(algo)
            .send()
            .await
            .map_err(|e| Error::SigningFailed(anyhow::anyhow!(e)))?;
        response
            .signature()
            .map(|b| b.as_ref().to_vec())
            .ok_or_else(|| Error::SigningFailed(anyhow::anyhow!("KMS response carried no signature")))
    }

    /// Signs every file concurrently, bounded by `max_workers`. The
    /// first failure cancels the rest of the batch (spec.md §4.5,
    /// §8 property 7): in-flight signing tasks are aborted, and tasks
    /// that have not yet been polled never run.
    pub async fn sign_batch(
        &self,
        keyid: &str,
        files: Vec<(String, Vec<u8>)>,
        detached: bool,
        digest_algo: DigestAlgorithm,
    ) -> Result<Vec<(String, String)>> {
        let mut set = JoinSet::new();
        for (index, (filename, content)) in files.into_iter().enumerate() {
            let keyid = keyid.to_string();
            let this = self.clone_handle();
            set.spawn(async move {
                let signature = this.sign(&keyid, &content, detached, digest_algo, false).await;
                (index, filename, signature)
            });
        }

        let mut results: Vec<Option<(String, String)>> = Vec::new();
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let (index, filename, outcome) = joined.map_err(|e| Error::SigningFailed(anyhow::anyhow!(e)))?;
            match outcome {
                Ok(signature) => {
                    if results.len() <= index {
                        results.resize(index + 1, None);
                    }
                    results[index] = Some((filename, signature));
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                    set.abort_all();
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(results.into_iter().flatten().collect())
    }

    /// Cheap clone of the bits an async task needs; the AWS client is
    /// internally `Arc`-backed and safe to share this way.
    fn clone_handle(&self) -> Self {
        Self {
            client: self.client.clone(),
            key_ids: self.key_ids.clone(),
            gpg_fingerprints: self.gpg_fingerprints.clone(),
            signing_algorithm: self.signing_algorithm.clone(),
            max_upload_bytes: self.max_upload_bytes,
            workers: self.workers.clone(),
        }
    }
}

fn signing_algorithm_spec(name: &str) -> SigningAlgorithmSpec {
    match name {
        "RSASSA_PKCS1_V1_5_SHA_384" => SigningAlgorithmSpec::RsassaPkcs1V15Sha384,
        "RSASSA_PKCS1_V1_5_SHA_512" => SigningAlgorithmSpec::RsassaPkcs1V15Sha512,
        _ => SigningAlgorithmSpec::RsassaPkcs1V15Sha256,
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as u32
}

fn parse_fingerprint(hex: &str) -> Option<[u8; 20]> {
    if hex.len() != 40 {
        return None;
    }
    let mut out = [0u8; 20];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_fingerprint() {
        let hex = "0123456789ABCDEF0123456789ABCDEF01234567";
        let fp = parse_fingerprint(hex).unwrap();
        assert_eq!(fp[0], 0x01);
        assert_eq!(fp[19], 0x67);
    }

    #[test]
    fn rejects_short_fingerprint() {
        assert!(parse_fingerprint("ABCDEF").is_none());
    }

    #[test]
    fn maps_known_signing_algorithms() {
        assert_eq!(signing_algorithm_spec("RSASSA_PKCS1_V1_5_SHA_384"), SigningAlgorithmSpec::RsassaPkcs1V15Sha384);
        assert_eq!(signing_algorithm_spec("unknown"), SigningAlgorithmSpec::RsassaPkcs1V15Sha256);
    }
}
