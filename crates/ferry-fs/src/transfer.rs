//! Exact byte-count transfer loops
//!
//! Both directions move exactly `size` bytes and never read past them: any
//! bytes that follow in a buffered source belong to the next control line.

use crate::error::{Error, Result};
use crate::protocol::CHUNK_SIZE;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

const PROGRESS_STEP: u64 = 1024 * 1024;

/// Which end of a copy is the peer connection. The other end is local.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    Source,
    Sink,
}

impl Wire {
    fn source_error(self) -> fn(io::Error) -> Error {
        match self {
            Self::Source => Error::Transport,
            // The peer has been promised bytes we can no longer produce
            Self::Sink => Error::Aborted,
        }
    }

    fn sink_error(self) -> fn(io::Error) -> Error {
        match self {
            Self::Source => Error::Io,
            Self::Sink => Error::Transport,
        }
    }
}

async fn timed<T, F>(timeout: Option<Duration>, fut: F, wrap: fn(io::Error) -> Error) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    let res = match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| Error::Timeout)?,
        None => fut.await,
    };
    res.map_err(wrap)
}

/// Run an I/O future on the connection under an optional deadline
pub(crate) async fn deadline<T, F>(timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    timed(timeout, fut, Error::Transport).await
}

/// Copy exactly `size` bytes from `source` to `sink`.
///
/// Short reads are retried until the count is reached. A source that ends
/// early yields [`Error::TruncatedStream`]. `progress` sees the running total
/// after every chunk.
///
/// When the local sink fails while receiving from the peer, the rest of the
/// payload is still read and dropped before [`Error::Io`] is returned, so the
/// connection stays usable.
pub async fn copy_exact<R, W, P>(
    source: &mut R,
    sink: &mut W,
    size: u64,
    wire: Wire,
    timeout: Option<Duration>,
    mut progress: P,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    P: FnMut(u64),
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    while total < size {
        // Bounded by CHUNK_SIZE, so the cast cannot truncate
        let want = (size - total).min(CHUNK_SIZE as u64) as usize;
        let n = timed(timeout, source.read(&mut buf[..want]), wire.source_error()).await?;
        if n == 0 {
            return Err(Error::TruncatedStream { expected: size, received: total });
        }
        let written = timed(timeout, sink.write_all(&buf[..n]), wire.sink_error()).await;

        let before = total;
        total += n as u64;
        if let Err(e) = written {
            if wire == Wire::Source && !e.is_fatal() {
                debug!(error = %e, remaining = size - total, "sink failed, draining payload");
                discard_exact(source, size - total, timeout).await?;
            }
            return Err(e);
        }

        if total / PROGRESS_STEP != before / PROGRESS_STEP || total == size {
            trace!(total, size, "transfer progress");
        }
        progress(total);
    }

    timed(timeout, sink.flush(), wire.sink_error()).await?;
    Ok(total)
}

/// Read and drop exactly `size` bytes from the peer, keeping the stream in
/// step after a payload has been refused.
pub async fn discard_exact<R>(source: &mut R, size: u64, timeout: Option<Duration>) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    while total < size {
        let want = (size - total).min(CHUNK_SIZE as u64) as usize;
        let n = deadline(timeout, source.read(&mut buf[..want])).await?;
        if n == 0 {
            return Err(Error::TruncatedStream { expected: size, received: total });
        }
        total += n as u64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncBufReadExt, BufReader};

    /// A local file that cannot take another byte
    struct FullDisk;

    impl AsyncWrite for FullDisk {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::other("No space left on device")))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn stops_at_declared_size() {
        let mut reader = BufReader::new(&b"helloquit\n"[..]);
        let mut out = Vec::new();

        let n = copy_exact(&mut reader, &mut out, 5, Wire::Source, None, |_| {}).await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, b"hello");

        // The bytes after the payload are still there for the line reader
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "quit\n");
    }

    #[tokio::test]
    async fn zero_size_reads_nothing() {
        let mut reader = BufReader::new(&b"list\n"[..]);
        let mut out = Vec::new();

        assert_eq!(copy_exact(&mut reader, &mut out, 0, Wire::Source, None, |_| {}).await.unwrap(), 0);
        assert!(out.is_empty());

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "list\n");
    }

    #[tokio::test]
    async fn multi_chunk_with_progress() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut source = &data[..];
        let mut out = Vec::new();
        let mut seen = Vec::new();

        copy_exact(&mut source, &mut out, data.len() as u64, Wire::Source, None, |t| seen.push(t)).await.unwrap();
        assert_eq!(out, data);
        assert_eq!(seen, vec![4096, 8192, 10_000]);
    }

    #[tokio::test]
    async fn early_eof_is_truncation() {
        let mut source = &b"ab"[..];
        let mut out = Vec::new();

        match copy_exact(&mut source, &mut out, 5, Wire::Source, None, |_| {}).await {
            Err(Error::TruncatedStream { expected, received }) => {
                assert_eq!((expected, received), (5, 2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn discard_leaves_following_line() {
        let mut reader = BufReader::new(&b"xyzlist\n"[..]);
        discard_exact(&mut reader, 3, None).await.unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "list\n");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_peer_times_out() {
        let (_peer, mut local) = tokio::io::duplex(64);
        let mut out = Vec::new();

        let res = copy_exact(&mut local, &mut out, 5, Wire::Source, Some(Duration::from_secs(1)), |_| {}).await;
        assert!(matches!(res, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn local_write_failure_drains_payload() {
        let mut wire = vec![7u8; 10_000];
        wire.extend_from_slice(b"list\n");
        let mut reader = BufReader::new(&wire[..]);

        let err = copy_exact(&mut reader, &mut FullDisk, 10_000, Wire::Source, None, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)), "unexpected: {err:?}");
        assert!(!err.is_fatal());

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "list\n");
    }

    #[tokio::test]
    async fn peer_write_failure_is_fatal() {
        let mut source = &b"hello"[..];
        let err = copy_exact(&mut source, &mut FullDisk, 5, Wire::Sink, None, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_fatal());
    }
}
