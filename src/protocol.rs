//! Wire protocol (spec §4.D): length-prefixed MessagePack framing between
//! the supervisor and a worker process.
//!
//! Spec §4.D leaves the concrete binary encoding open ("a self-describing
//! binary encoding of a map"); this is resolved against
//! `original_source/src/worker.py`, which frames every message as a 4-byte
//! little-endian length prefix followed by a `msgpack` payload. `rmp-serde`
//! is the direct Rust equivalent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Messages larger than this are rejected rather than allocated, guarding
/// against a corrupt or malicious length prefix.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// A command sent from the supervisor to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Request {
    /// Run one test item identified by `id`.
    Run {
        id: u64,
        file: String,
        class: Option<String>,
        function: String,
        collect_coverage: bool,
    },
    /// Liveness probe; a healthy worker answers with `Response::Pong`.
    Ping { id: u64 },
    /// Ask the worker to exit cleanly.
    Shutdown { id: u64 },
}

impl Request {
    pub fn id(&self) -> u64 {
        match self {
            Request::Run { id, .. } | Request::Ping { id } | Request::Shutdown { id } => *id,
        }
    }
}

/// The error payload of a failed test, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestError {
    pub message: String,
    pub traceback: String,
}

/// A worker's reply to one request, correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub error: Option<TestError>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub duration_sec: f64,
    /// Per-file sets of line numbers executed while running this item.
    #[serde(default)]
    pub coverage: Option<BTreeMap<String, Vec<u32>>>,
    /// Set instead of the fields above when this is a reply to `Ping`.
    #[serde(default)]
    pub pong: bool,
}

impl Response {
    pub fn pong(id: u64) -> Self {
        Self {
            id,
            pong: true,
            passed: true,
            ..Self::failure(id, String::new(), String::new())
        }
    }

    /// Synthesizes a failing response for an item whose worker crashed or
    /// timed out mid-run, per spec §4.E: "the in-flight item is reported as
    /// a failure with a message identifying the cause."
    pub fn failure(id: u64, message: String, traceback: String) -> Self {
        Self {
            id,
            passed: false,
            error: Some(TestError { message, traceback }),
            stdout: String::new(),
            stderr: String::new(),
            duration_sec: 0.0,
            coverage: None,
            pong: false,
        }
    }
}

/// Reads one length-prefixed MessagePack frame and decodes it as `T`.
///
/// Returns `Err(ProtocolError::Eof)` when the peer closed the stream before
/// any byte of a new frame arrived — the normal shape of "worker exited".
pub async fn read_frame<T, R>(reader: &mut R) -> Result<T, ProtocolError>
where
    T: for<'de> Deserialize<'de>,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::Eof),
        Err(err) => return Err(ProtocolError::Io(err)),
    }
    let len = u32::from_le_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len, MAX_FRAME_BYTES));
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => ProtocolError::Eof,
            _ => ProtocolError::Io(err),
        })?;

    Ok(rmp_serde::from_slice(&payload)?)
}

/// Encodes `value` as MessagePack and writes it with its 4-byte length
/// prefix.
pub async fn write_frame<T, W>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let payload = rmp_serde::to_vec_named(value)?;
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge(u32::MAX, MAX_FRAME_BYTES))?;
    if len > MAX_FRAME_BYTES {
        return Err(ProtocolError::FrameTooLarge(len, MAX_FRAME_BYTES));
    }
    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_request() {
        let request = Request::Run {
            id: 7,
            file: "tests/test_foo.py".to_string(),
            class: Some("TestFoo".to_string()),
            function: "test_bar".to_string(),
            collect_coverage: true,
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &request).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded: Request = read_frame(&mut cursor).await.unwrap();
        assert_eq!(decoded.id(), 7);
        match decoded {
            Request::Run { function, collect_coverage, .. } => {
                assert_eq!(function, "test_bar");
                assert!(collect_coverage);
            }
            _ => panic!("expected Run"),
        }
    }

    #[tokio::test]
    async fn empty_stream_is_eof_not_an_error() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let err = read_frame::<Response, _>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::Eof));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected_before_allocating() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_le_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame::<Response, _>(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge(_, _)));
    }

    #[tokio::test]
    async fn response_round_trips_with_coverage() {
        let mut coverage = BTreeMap::new();
        coverage.insert("tests/test_foo.py".to_string(), vec![1, 2, 5]);
        let response = Response {
            id: 3,
            passed: true,
            error: None,
            stdout: "ok\n".to_string(),
            stderr: String::new(),
            duration_sec: 0.01,
            coverage: Some(coverage),
            pong: false,
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &response).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let decoded: Response = read_frame(&mut cursor).await.unwrap();
        assert!(decoded.passed);
        assert_eq!(decoded.coverage.unwrap()["tests/test_foo.py"], vec![1, 2, 5]);
    }
}
