//! The Passphrase DB (spec.md §4.1): built once at process start,
//! read-only for the rest of the process's life.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use crate::agent::restart_gpg_agent;
use crate::error::{Error, Result};
use crate::gpg::Gpg;

const SELF_CHECK_PLAINTEXT: &[u8] = b"signd passphrase self-check\n";

/// One configured signing key, immutable after [`PassphraseDb::init`]
/// returns.
#[derive(Clone, Debug)]
pub struct KeyRecord {
    pub keyid: String,
    pub fingerprint: String,
    pub subkeys: Vec<String>,
    passphrase: String,
}

impl KeyRecord {
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

/// How a key's passphrase is acquired during startup.
pub enum PassphraseSource {
    /// Prompt on the controlling terminal, once per key.
    Interactive,
    /// Apply the same passphrase to every configured key (development
    /// deployments only).
    Development(String),
}

pub struct PassphraseDb {
    keys: HashMap<String, KeyRecord>,
}

impl PassphraseDb {
    /// Builds the DB. Any per-key failure aborts the whole process
    /// (spec.md §4.1, "Failure semantics"): a partially valid DB must
    /// never be handed to callers.
    pub fn init(gpg: &Gpg, pgp_keys: &[String], source: PassphraseSource) -> Result<Self> {
        if let PassphraseSource::Development(ref pass) = source {
            if pass.is_empty() {
                return Err(Error::MissingDevelopmentPassphrase);
            }
        }

        let listings = gpg.list_secret_keys()?;
        let mut keys = HashMap::with_capacity(pgp_keys.len());

        for keyid in pgp_keys {
            let listing = listings
                .iter()
                .find(|k| &k.keyid == keyid)
                .ok_or_else(|| Error::KeyNotFound(keyid.clone()))?;

            let passphrase = match &source {
                PassphraseSource::Development(pass) => pass.clone(),
                PassphraseSource::Interactive => {
                    rpassword::prompt_password(format!("\nPlease enter the {keyid} PGP key password: "))?
                }
            };

            if !verify_passphrase(gpg, keyid, &passphrase)? {
                return Err(Error::InvalidPassphrase(keyid.clone()));
            }

            keys.insert(
                keyid.clone(),
                KeyRecord {
                    keyid: keyid.clone(),
                    fingerprint: listing.fingerprint.clone(),
                    subkeys: listing.subkeys.clone(),
                    passphrase,
                },
            );
        }

        Ok(Self { keys })
    }

    pub fn key_exists(&self, keyid: &str) -> bool {
        self.keys.contains_key(keyid)
    }

    pub fn get(&self, keyid: &str) -> Option<&KeyRecord> {
        self.keys.get(keyid)
    }

    /// Infallible after startup: callers only ever pass a `keyid`
    /// that [`key_exists`](Self::key_exists) already confirmed.
    pub fn passphrase(&self, keyid: &str) -> &str {
        self.keys.get(keyid).expect("keyid checked with key_exists before use").passphrase()
    }

    pub fn list_keyids(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }
}

/// Verifies a passphrase by producing a detached signature over a
/// fixed plaintext with `keyid` and self-verifying it. Restarts the
/// agent first so no cached passphrase taints the result (spec.md
/// §4.1 step 3).
fn verify_passphrase(gpg: &Gpg, keyid: &str, passphrase: &str) -> Result<bool> {
    restart_gpg_agent();

    let dir = tempfile::tempdir()?;
    let plaintext_path = dir.path().join("selfcheck");
    std::fs::write(&plaintext_path, SELF_CHECK_PLAINTEXT)?;

    if gpg.sign(keyid, passphrase, "SHA256", true, &plaintext_path).is_err() {
        return Ok(false);
    }

    let sig_path = {
        let mut p = plaintext_path.clone().into_os_string();
        p.push(".asc");
        std::path::PathBuf::from(p)
    };
    if !sig_path.exists() {
        return Ok(false);
    }

    let status = Command::new(gpg.binary())
        .arg("--verify")
        .arg(&sig_path)
        .arg(&plaintext_path)
        .status()?;
    let _ = std::fs::remove_file(&sig_path);
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_mode_rejects_empty_passphrase() {
        let gpg = Gpg::new("gpg2", "/nonexistent");
        let result = PassphraseDb::init(&gpg, &[], PassphraseSource::Development(String::new()));
        assert!(matches!(result, Err(Error::MissingDevelopmentPassphrase)));
    }
}
