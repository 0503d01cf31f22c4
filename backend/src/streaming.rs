//! Bounded streaming helpers shared by the GPG and KMS backend
//! adapters: uploads are read in fixed-size chunks so an oversized
//! file is rejected before it is fully buffered or written to disk
//! (spec.md §4.3 "Upload size enforcement").

use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 1024 * 1024;

/// Reads `reader` into memory, failing as soon as `max_bytes` would be
/// exceeded rather than after buffering the whole oversized payload.
pub async fn read_to_vec_bounded(
    mut reader: impl AsyncRead + Unpin,
    max_bytes: u64,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await.map_err(|e| Error::SigningFailed(e.into()))?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
        if out.len() as u64 > max_bytes {
            return Err(Error::FileTooBig { limit: max_bytes });
        }
    }
    Ok(out)
}

/// Streams `reader` to a new file at `path`, same early-reject
/// behavior as [`read_to_vec_bounded`], for backends that hand the
/// content to a subprocess rather than an in-memory API.
pub async fn write_to_file_bounded(
    mut reader: impl AsyncRead + Unpin,
    path: &Path,
    max_bytes: u64,
) -> Result<u64> {
    let mut file = tokio::fs::File::create(path).await.map_err(|e| Error::SigningFailed(e.into()))?;
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = reader.read(&mut chunk).await.map_err(|e| Error::SigningFailed(e.into()))?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if total > max_bytes {
            let _ = tokio::fs::remove_file(path).await;
            return Err(Error::FileTooBig { limit: max_bytes });
        }
        file.write_all(&chunk[..n]).await.map_err(|e| Error::SigningFailed(e.into()))?;
    }
    file.flush().await.map_err(|e| Error::SigningFailed(e.into()))?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Minimal in-memory `AsyncRead`, mirroring `routes::MemoryReader`
    /// in the `service` crate, so these tests don't depend on whether
    /// `tokio` happens to impl `AsyncRead` for a bare slice.
    struct SliceReader {
        cursor: std::io::Cursor<Vec<u8>>,
    }

    impl SliceReader {
        fn new(data: Vec<u8>) -> Self {
            Self { cursor: std::io::Cursor::new(data) }
        }
    }

    impl AsyncRead for SliceReader {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
            let n = std::io::Read::read(&mut self.cursor, buf.initialize_unfilled())?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn read_to_vec_bounded_accepts_content_under_the_limit() {
        let data = vec![0x42u8; 10];
        let got = read_to_vec_bounded(SliceReader::new(data.clone()), 10).await.unwrap();
        assert_eq!(got, data);
    }

    #[tokio::test]
    async fn read_to_vec_bounded_rejects_content_over_the_limit() {
        let data = vec![0x42u8; 11];
        let err = read_to_vec_bounded(SliceReader::new(data), 10).await.unwrap_err();
        assert!(matches!(err, Error::FileTooBig { limit: 10 }));
    }

    #[tokio::test]
    async fn write_to_file_bounded_writes_exact_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        let data = vec![0x7Au8; 2048];
        let total = write_to_file_bounded(SliceReader::new(data.clone()), &path, 4096).await.unwrap();
        assert_eq!(total, data.len() as u64);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), data);
    }

    #[tokio::test]
    async fn write_to_file_bounded_deletes_partial_file_on_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        let data = vec![0x7Au8; 4097];
        let err = write_to_file_bounded(SliceReader::new(data), &path, 4096).await.unwrap_err();
        assert!(matches!(err, Error::FileTooBig { limit: 4096 }));
        assert!(!path.exists());
    }
}
