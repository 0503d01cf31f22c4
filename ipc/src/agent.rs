//! gpg-agent lifecycle helpers.

use std::process::Command;

/// Restarts (reloads) `gpg-agent` so no cached passphrase taints the
/// next operation (spec.md §4.1 step 3, §4.4 step 5). Mirrors the
/// original service's use of `gpgconf --reload gpg-agent`: failures
/// are logged, never propagated, since a missing agent is harmless
/// (gpg2 will start a fresh one on demand).
pub fn restart_gpg_agent() {
    match Command::new("gpgconf").args(["--reload", "gpg-agent"]).status() {
        Ok(status) if status.success() => tracing::debug!("gpg-agent reloaded"),
        Ok(status) => tracing::warn!(?status, "gpgconf --reload gpg-agent exited non-zero"),
        Err(e) => tracing::warn!(error = %e, "failed to invoke gpgconf"),
    }
}
