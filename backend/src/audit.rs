//! Audit log (spec.md §4.8): one structured record per signing
//! attempt, success or failure, emitted through the process's own
//! `tracing` subscriber rather than a separate log sink — whatever
//! the deployment wires `tracing-subscriber` to forward to (syslog,
//! journald, a file) receives it the same way every other log line
//! does.

pub struct AuditLog {
    service: String,
}

/// Outcome of one signing attempt, recorded verbatim in the audit
/// record.
pub enum Status {
    Success,
    Failed,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Failed => "failed",
        }
    }
}

impl AuditLog {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service: service_name.into() }
    }

    /// Records a GPG-backed signing attempt: both the pre- and
    /// post-signing content hash are always present (spec.md §3
    /// invariants).
    pub fn record_gpg(&self, filename: &str, pre_hash: &str, post_hash: &str, keyid: &str, status: Status) {
        tracing::info!(
            target: "signd::audit",
            service = %self.service,
            backend = "gpg",
            filename,
            pre_hash,
            post_hash,
            keyid,
            status = status.as_str(),
            "sign attempt",
        );
    }

    /// Records a KMS-backed attempt. `pre_hash` is omitted when the
    /// backend used `raw_signature=true`, per spec.md §4.8.
    pub fn record_kms(&self, filename: &str, pre_hash: Option<&str>, keyid: &str, status: Status) {
        tracing::info!(
            target: "signd::audit",
            service = %self.service,
            backend = "kms",
            filename,
            pre_hash,
            keyid,
            status = status.as_str(),
            "sign attempt",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_without_panicking() {
        let log = AuditLog::new("test-service");
        log.record_gpg("file.bin", "aaaa", "bbbb", "KEYID", Status::Success);
        log.record_kms("file.bin", None, "KEYID", Status::Failed);
    }
}
