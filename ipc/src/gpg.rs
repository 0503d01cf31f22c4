//! Driving the `gpg2` binary: listing secret keys and invoking it to
//! sign a file with expect-style passphrase injection (spec.md §4.4).
//!
//! The library's own streaming sign API is deliberately not used: it
//! has been observed to produce malformed signatures for binary
//! content, so the CLI is the only reliable producer (spec.md §4.4).

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::{Error, Result};

const PASSPHRASE_PROMPT: &str = r"[Ee]nter passphrase.*";
const SIGN_TIMEOUT: Duration = Duration::from_secs(1200);

/// One secret key as reported by `gpg2 --list-secret-keys`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyListing {
    pub keyid: String,
    pub fingerprint: String,
    pub subkeys: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Gpg {
    binary: PathBuf,
    keyring: PathBuf,
}

impl Gpg {
    pub fn new(binary: impl Into<PathBuf>, keyring: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), keyring: keyring.into() }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Lists all secret keys in the configured keyring, parsing
    /// `--with-colons` machine-readable output.
    pub fn list_secret_keys(&self) -> Result<Vec<KeyListing>> {
        let output = Command::new(&self.binary)
            .args(["--batch", "--with-colons", "--fixed-list-mode", "--fingerprint"])
            .arg("--keyring")
            .arg(&self.keyring)
            .arg("--list-secret-keys")
            .output()?;
        if !output.status.success() {
            return Err(Error::Other(anyhow::anyhow!(
                "gpg2 --list-secret-keys failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(parse_colon_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Invokes `gpg2` to sign `input_path` with `keyid`, answering the
    /// passphrase prompt over the child's pseudo-terminal. On success
    /// the signature is left at `<input_path>.asc`; the caller reads
    /// and removes it (spec.md §4.4 step 7).
    #[cfg(unix)]
    pub fn sign(
        &self,
        keyid: &str,
        passphrase: &str,
        digest_algo: &str,
        detached: bool,
        input_path: &Path,
    ) -> Result<()> {
        let mut command = Command::new(&self.binary);
        command
            .env("LC_ALL", "en_US.UTF-8")
            .arg("--yes")
            .arg("--pinentry-mode")
            .arg("loopback")
            .arg("--digest-algo")
            .arg(digest_algo)
            .arg(if detached { "--detach-sign" } else { "--clear-sign" })
            .arg("--armor")
            .arg("--default-key")
            .arg(keyid)
            .arg(input_path);

        let mut session = rexpect::session::spawn_command(command, Some(SIGN_TIMEOUT.as_millis() as u64))
            .map_err(|e| Error::Other(anyhow::anyhow!("failed to spawn gpg2: {e}")))?;

        let mut transcript = String::new();
        match session.exp_regex(PASSPHRASE_PROMPT) {
            Ok((before, matched)) => {
                transcript.push_str(&before);
                transcript.push_str(&matched);
                session
                    .send(&format!("{passphrase}\r"))
                    .map_err(|e| Error::Other(anyhow::anyhow!("failed to send passphrase: {e}")))?;
                session.flush().ok();
            }
            Err(rexpect::error::Error::EOF { got, .. }) => {
                // gpg2 never prompted: either the key needs no
                // passphrase or it already failed before asking.
                transcript.push_str(&got);
            }
            Err(e) => return Err(Error::Other(anyhow::anyhow!("waiting for passphrase prompt: {e}"))),
        }

        if let Ok(rest) = session.exp_eof() {
            transcript.push_str(&rest);
        }

        let status = session
            .process
            .wait()
            .map_err(|e| Error::Other(anyhow::anyhow!("waiting for gpg2 exit: {e}")))?;

        if !matches!(status, rexpect::process::wait::WaitStatus::Exited(_, 0)) {
            return Err(Error::SigningFailed { output: transcript });
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn sign(
        &self,
        keyid: &str,
        passphrase: &str,
        digest_algo: &str,
        detached: bool,
        input_path: &Path,
    ) -> Result<()> {
        // No PTY support: fall back to a dedicated passphrase file
        // descriptor, per spec.md §9's design note.
        use std::io::Write;
        let mut passphrase_file = tempfile::NamedTempFile::new()?;
        writeln!(passphrase_file, "{passphrase}")?;
        let output = Command::new(&self.binary)
            .env("LC_ALL", "en_US.UTF-8")
            .arg("--yes")
            .arg("--pinentry-mode")
            .arg("loopback")
            .arg("--passphrase-file")
            .arg(passphrase_file.path())
            .arg("--digest-algo")
            .arg(digest_algo)
            .arg(if detached { "--detach-sign" } else { "--clear-sign" })
            .arg("--armor")
            .arg("--default-key")
            .arg(keyid)
            .arg(input_path)
            .output()?;
        if !output.status.success() {
            return Err(Error::SigningFailed { output: String::from_utf8_lossy(&output.stderr).into_owned() });
        }
        Ok(())
    }
}

fn parse_colon_listing(output: &str) -> Vec<KeyListing> {
    let mut keys = Vec::new();
    let mut current: Option<KeyListing> = None;
    let mut expecting_subkey_fpr = false;

    for line in output.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        match fields.first().copied() {
            Some("sec") => {
                if let Some(key) = current.take() {
                    keys.push(key);
                }
                let keyid = fields.get(4).unwrap_or(&"").to_string();
                current = Some(KeyListing { keyid, fingerprint: String::new(), subkeys: Vec::new() });
                expecting_subkey_fpr = false;
            }
            Some("ssb") => {
                expecting_subkey_fpr = true;
            }
            Some("fpr") => {
                let fingerprint = fields.get(9).unwrap_or(&"").to_string();
                if let Some(key) = current.as_mut() {
                    if expecting_subkey_fpr {
                        key.subkeys.push(fingerprint);
                        expecting_subkey_fpr = false;
                    } else if key.fingerprint.is_empty() {
                        key.fingerprint = fingerprint;
                    }
                }
            }
            _ => {}
        }
    }
    if let Some(key) = current.take() {
        keys.push(key);
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primary_key_and_subkey_fingerprints() {
        let output = "\
sec:u:2048:1:1234567890ABCDEF:1600000000:::u:::scESC:::+:::23::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEF01234567:
ssb:u:2048:1:FEDCBA0987654321:1600000000::::::e:::+:::23:
fpr:::::::::FEDCBA0123456789ABCDEF0123456789ABCD1234:
";
        let keys = parse_colon_listing(output);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].keyid, "1234567890ABCDEF");
        assert_eq!(keys[0].fingerprint, "0123456789ABCDEF0123456789ABCDEF01234567");
        assert_eq!(keys[0].subkeys, vec!["FEDCBA0123456789ABCDEF0123456789ABCD1234".to_string()]);
    }

    #[test]
    fn handles_multiple_keys() {
        let output = "\
sec:u:2048:1:AAAA:1600000000:::u:::scESC:::+:::23::0:
fpr:::::::::AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA:
sec:u:2048:1:BBBB:1600000000:::u:::scESC:::+:::23::0:
fpr:::::::::BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB:
";
        let keys = parse_colon_listing(output);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].keyid, "BBBB");
    }
}
