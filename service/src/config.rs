//! Settings loading: a TOML file overlaid by `SF_`-prefixed
//! environment variables (spec.md §6), mirroring the original's
//! `pydantic.BaseSettings` with the env-overlay pattern used in
//! `rust-lang-promote-release/src/config.rs`.

use std::collections::HashMap;
use std::env::VarError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

const ENV_PREFIX: &str = "SF_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningBackendKind {
    Gpg,
    Kms,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KmsKeyMapping {
    pub kms_id: String,
    pub gpg_fingerprint: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    gpg_binary: Option<String>,
    keyring: Option<String>,
    locks_dir: Option<String>,
    max_upload_bytes: Option<u64>,
    pass_db_dev_mode: Option<bool>,
    pass_db_dev_pass: Option<String>,
    tmp_dir: Option<String>,
    pgp_keys: Option<Vec<String>>,
    db_url: Option<String>,
    db_pool_size: Option<u32>,
    db_max_overflow: Option<u32>,
    db_pool_recycle: Option<i64>,
    db_pool_pre_ping: Option<bool>,
    db_echo: Option<bool>,
    jwt_secret_key: Option<String>,
    jwt_expire_minutes: Option<i64>,
    jwt_algorithm: Option<String>,
    root_url: Option<String>,
    service: Option<String>,
    signing_backend: Option<SigningBackendKind>,
    kms_region: Option<String>,
    kms_signing_algorithm: Option<String>,
    kms_max_workers: Option<usize>,
    kms_keys: Option<Vec<KmsKeyMapping>>,
    bind_addr: Option<String>,
}

/// The frozen, fully-resolved process configuration. Immutable once
/// loaded; carried as a shared reference through the whole service.
#[derive(Debug, Clone)]
pub struct Settings {
    pub gpg_binary: PathBuf,
    pub keyring: PathBuf,
    pub locks_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub pass_db_dev_mode: bool,
    pub pass_db_dev_pass: String,
    pub tmp_dir: PathBuf,
    pub pgp_keys: Vec<String>,
    pub db_url: String,
    pub db_pool_size: u32,
    pub db_max_overflow: u32,
    pub db_pool_recycle: i64,
    pub db_pool_pre_ping: bool,
    pub db_echo: bool,
    pub jwt_secret_key: String,
    pub jwt_expire_minutes: i64,
    pub jwt_algorithm: String,
    pub root_url: String,
    pub service: String,
    pub signing_backend: SigningBackendKind,
    pub kms_region: Option<String>,
    pub kms_signing_algorithm: String,
    pub kms_max_workers: usize,
    pub kms_keys: Vec<KmsKeyMapping>,
    pub bind_addr: String,
}

impl Settings {
    /// Loads `path` (if it exists) as a TOML base, then overlays every
    /// field with its `SF_<NAME>` environment variable when present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut raw = match path {
            Some(p) if p.exists() => {
                let text = std::fs::read_to_string(p)?;
                toml::from_str(&text)?
            }
            _ => RawSettings::default(),
        };

        overlay_env(&mut raw)?;

        Ok(Self {
            gpg_binary: raw.gpg_binary.unwrap_or_else(|| "/usr/bin/gpg2".to_string()).into(),
            keyring: raw.keyring.unwrap_or_else(default_keyring).into(),
            locks_dir: raw.locks_dir.unwrap_or_else(|| "/tmp/signd-locks".to_string()).into(),
            max_upload_bytes: raw.max_upload_bytes.unwrap_or(100_000_000),
            pass_db_dev_mode: raw.pass_db_dev_mode.unwrap_or(false),
            pass_db_dev_pass: raw.pass_db_dev_pass.unwrap_or_default(),
            tmp_dir: raw.tmp_dir.unwrap_or_else(|| "/tmp".to_string()).into(),
            pgp_keys: raw.pgp_keys.unwrap_or_default(),
            db_url: raw.db_url.unwrap_or_else(|| "sqlite://./signd.sqlite3".to_string()),
            db_pool_size: raw.db_pool_size.unwrap_or(5),
            db_max_overflow: raw.db_max_overflow.unwrap_or(10),
            db_pool_recycle: raw.db_pool_recycle.unwrap_or(1800),
            db_pool_pre_ping: raw.db_pool_pre_ping.unwrap_or(true),
            db_echo: raw.db_echo.unwrap_or(false),
            jwt_secret_key: raw
                .jwt_secret_key
                .ok_or_else(|| anyhow::anyhow!("SF_JWT_SECRET_KEY is required"))?,
            jwt_expire_minutes: raw.jwt_expire_minutes.unwrap_or(30),
            jwt_algorithm: raw.jwt_algorithm.unwrap_or_else(|| "HS256".to_string()),
            root_url: raw.root_url.unwrap_or_default(),
            service: raw.service.unwrap_or_else(|| "signd".to_string()),
            signing_backend: raw.signing_backend.unwrap_or(SigningBackendKind::Gpg),
            kms_region: raw.kms_region,
            kms_signing_algorithm: raw
                .kms_signing_algorithm
                .unwrap_or_else(|| "RSASSA_PKCS1_V1_5_SHA_256".to_string()),
            kms_max_workers: raw.kms_max_workers.unwrap_or(4),
            kms_keys: raw.kms_keys.unwrap_or_default(),
            bind_addr: raw.bind_addr.unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        })
    }

    pub fn kms_fingerprints(&self) -> HashMap<String, String> {
        self.kms_keys.iter().map(|k| (k.kms_id.clone(), k.gpg_fingerprint.clone())).collect()
    }

    pub fn kms_key_ids(&self) -> Vec<String> {
        self.kms_keys.iter().map(|k| k.kms_id.clone()).collect()
    }
}

fn default_keyring() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
    format!("{home}/.gnupg/pubring.kbx")
}

fn overlay_env(raw: &mut RawSettings) -> anyhow::Result<()> {
    raw.gpg_binary = maybe_env("GPG_BINARY")?.or(raw.gpg_binary.take());
    raw.keyring = maybe_env("KEYRING")?.or(raw.keyring.take());
    raw.locks_dir = maybe_env("LOCKS_DIR")?.or(raw.locks_dir.take());
    raw.max_upload_bytes = maybe_env("MAX_UPLOAD_BYTES")?.or(raw.max_upload_bytes.take());
    raw.pass_db_dev_mode = maybe_env("PASS_DB_DEV_MODE")?.or(raw.pass_db_dev_mode.take());
    raw.pass_db_dev_pass = maybe_env("PASS_DB_DEV_PASS")?.or(raw.pass_db_dev_pass.take());
    raw.tmp_dir = maybe_env("TMP_FILE_DIR")?.or(raw.tmp_dir.take());
    raw.db_url = maybe_env("DB_URL")?.or(raw.db_url.take());
    raw.db_pool_size = maybe_env("DB_POOL_SIZE")?.or(raw.db_pool_size.take());
    raw.db_max_overflow = maybe_env("DB_MAX_OVERFLOW")?.or(raw.db_max_overflow.take());
    raw.db_pool_recycle = maybe_env("DB_POOL_RECYCLE")?.or(raw.db_pool_recycle.take());
    raw.db_pool_pre_ping = maybe_env("DB_POOL_PRE_PING")?.or(raw.db_pool_pre_ping.take());
    raw.db_echo = maybe_env("DB_ECHO")?.or(raw.db_echo.take());
    raw.jwt_secret_key = maybe_env("JWT_SECRET_KEY")?.or(raw.jwt_secret_key.take());
    raw.jwt_expire_minutes = maybe_env("JWT_EXPIRE_MINUTES")?.or(raw.jwt_expire_minutes.take());
    raw.jwt_algorithm = maybe_env("JWT_ALGORITHM")?.or(raw.jwt_algorithm.take());
    raw.root_url = maybe_env("ROOT_URL")?.or(raw.root_url.take());
    raw.service = maybe_env::<String>("SERVICE")?.or_else(|| std::env::var("TARGET_SERVICE").ok()).or(raw.service.take());
    raw.kms_region = maybe_env("KMS_REGION")?.or(raw.kms_region.take());
    raw.kms_signing_algorithm = maybe_env("KMS_SIGNING_ALGORITHM")?.or(raw.kms_signing_algorithm.take());
    raw.kms_max_workers = maybe_env("KMS_MAX_WORKERS")?.or(raw.kms_max_workers.take());
    raw.bind_addr = maybe_env("BIND_ADDR")?.or(raw.bind_addr.take());
    if let Some(kind) = maybe_env::<String>("SIGNING_BACKEND")? {
        raw.signing_backend = match kind.to_lowercase().as_str() {
            "kms" => Some(SigningBackendKind::Kms),
            _ => Some(SigningBackendKind::Gpg),
        };
    }
    if let Some(keys) = maybe_env::<String>("PGP_KEYS_ID")? {
        raw.pgp_keys = Some(keys.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect());
    }
    Ok(())
}

fn maybe_env<R>(name: &str) -> anyhow::Result<Option<R>>
where
    R: FromStr,
    R::Err: std::fmt::Display,
{
    match std::env::var(format!("{ENV_PREFIX}{name}")) {
        Ok(val) => Ok(Some(
            val.parse()
                .map_err(|e| anyhow::anyhow!("environment variable {ENV_PREFIX}{name} is invalid: {e}"))?,
        )),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => anyhow::bail!("environment variable {ENV_PREFIX}{name} is not unicode"),
    }
}
