//! Length-prefixed message framing.
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```
//!
//! [`read_frame`] and [`write_frame`] work on any tokio byte stream and are
//! shared by the daemon and the CLI; the optional timeout applies to each
//! individual read or write.

use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Validates a length prefix and returns the payload size it announces.
pub fn frame_len(prefix: [u8; 4]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    Ok(len)
}

/// Encodes a message with its length prefix.
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    if json.len() > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(4 + json.len());
    buffer.extend_from_slice(&(json.len() as u32).to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes one complete frame (prefix + payload). Trailing bytes are ignored.
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    let Some((prefix, rest)) = data.split_first_chunk::<4>() else {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4,
            received: data.len(),
        });
    };
    let len = frame_len(*prefix)?;
    let Some(payload) = rest.get(..len) else {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4 + len,
            received: data.len(),
        });
    };
    Ok(serde_json::from_slice(payload)?)
}

/// Reads one frame from `reader`.
///
/// Returns `Ok(None)` on a clean EOF before the first byte of the prefix.
pub async fn read_frame<R, T>(reader: &mut R, timeout: Option<Duration>) -> ProtocolResult<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    match with_timeout(timeout, "read length", reader.read_exact(&mut prefix)).await? {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = frame_len(prefix)?;
    let mut payload = vec![0u8; len];
    match with_timeout(timeout, "read payload", reader.read_exact(&mut payload)).await? {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::IncompleteMessage {
                expected: len,
                received: 0,
            });
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Writes one frame to `writer` and flushes it.
pub async fn write_frame<W, T>(writer: &mut W, message: &T, timeout: Option<Duration>) -> ProtocolResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let data = encode_message(message)?;
    with_timeout(timeout, "write message", async {
        writer.write_all(&data).await?;
        writer.flush().await
    })
    .await??;
    Ok(())
}

async fn with_timeout<F: Future>(
    timeout: Option<Duration>,
    operation: &str,
    fut: F,
) -> ProtocolResult<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ProtocolError::timeout(operation)),
        None => Ok(fut.await),
    }
}
