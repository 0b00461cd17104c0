//! Length-prefixed JSON framing for IPC.
//!
//! Used on the supervisor's Unix socket and on worker stdin/stdout:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, ProtocolResult};

/// Encodes a message with its length prefix.
pub fn encode_message<T: Serialize>(message: &T, max: usize) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    if json.len() > max {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max,
        });
    }

    let mut buffer = Vec::with_capacity(4 + json.len());
    buffer.extend_from_slice(&(json.len() as u32).to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes one complete length-prefixed message.
///
/// # Example
///
/// ```rust
/// use eppd_protocol::{decode_message, encode_message, WorkerRequest, MAX_MESSAGE_SIZE};
///
/// let request = WorkerRequest::init("registry-test1");
/// let bytes = encode_message(&request, MAX_MESSAGE_SIZE).unwrap();
/// let decoded: WorkerRequest = decode_message(&bytes, MAX_MESSAGE_SIZE).unwrap();
/// assert_eq!(decoded, request);
/// ```
pub fn decode_message<T: DeserializeOwned>(data: &[u8], max: usize) -> ProtocolResult<T> {
    let Some(len_bytes) = data.get(..4) else {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4,
            received: data.len(),
        });
    };
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;

    if len > max {
        return Err(ProtocolError::MessageTooLarge { size: len, max });
    }
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }
    if data.len() < 4 + len {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4 + len,
            received: data.len(),
        });
    }

    Ok(serde_json::from_slice(&data[4..4 + len])?)
}

/// Reads one message from an async stream.
///
/// Returns `Ok(None)` on a clean end of stream before any byte of the
/// length prefix.
pub async fn read_message<T, R>(reader: &mut R, max: usize) -> ProtocolResult<Option<T>>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max {
        return Err(ProtocolError::MessageTooLarge { size: len, max });
    }
    if len == 0 {
        return Err(ProtocolError::EmptyMessage);
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ProtocolError::IncompleteMessage {
                expected: len,
                received: 0,
            }
        } else {
            e.into()
        }
    })?;

    Ok(Some(serde_json::from_slice(&payload)?))
}

/// Writes one message to an async stream and flushes it.
pub async fn write_message<T, W>(writer: &mut W, message: &T, max: usize) -> ProtocolResult<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let data = encode_message(message, max)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_MESSAGE_SIZE, MAX_REPLY_SIZE, WorkerReply, WorkerRequest};
    use serde_json::json;

    #[test]
    fn length_prefix_matches_payload() {
        let bytes = encode_message(&WorkerRequest::init("r1"), MAX_MESSAGE_SIZE).unwrap();
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len() - 4);
    }

    #[test]
    fn decode_incomplete_length() {
        let result: ProtocolResult<WorkerRequest> = decode_message(&[0, 0], MAX_MESSAGE_SIZE);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[b' '; 10]);
        let result: ProtocolResult<WorkerRequest> = decode_message(&data, MAX_MESSAGE_SIZE);
        assert!(matches!(result, Err(ProtocolError::IncompleteMessage { .. })));
    }

    #[test]
    fn encode_respects_limit() {
        let big = WorkerRequest::command("createDomain", json!({"name": "x".repeat(200)}));
        assert!(matches!(
            encode_message(&big, 64),
            Err(ProtocolError::MessageTooLarge { max: 64, .. })
        ));
    }

    #[tokio::test]
    async fn async_stream_carries_several_messages() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        let first = WorkerRequest::init("registry-test1");
        let second = WorkerRequest::command("checkDomain", json!({"name": "example.com"}));
        write_message(&mut client, &first, MAX_MESSAGE_SIZE).await.unwrap();
        write_message(&mut client, &second, MAX_MESSAGE_SIZE).await.unwrap();
        drop(client);

        let a: WorkerRequest = read_message(&mut server, MAX_MESSAGE_SIZE).await.unwrap().unwrap();
        let b: WorkerRequest = read_message(&mut server, MAX_MESSAGE_SIZE).await.unwrap().unwrap();
        let eof: Option<WorkerRequest> = read_message(&mut server, MAX_MESSAGE_SIZE).await.unwrap();

        assert_eq!(a, first);
        assert_eq!(b, second);
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn async_read_rejects_empty_message() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&0u32.to_be_bytes()).await.unwrap();

        let result: ProtocolResult<Option<WorkerReply>> =
            read_message(&mut server, MAX_REPLY_SIZE).await;
        assert!(matches!(result, Err(ProtocolError::EmptyMessage)));
    }

    #[tokio::test]
    async fn async_read_reports_truncated_payload() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0, 0, 0, 20, b'{']).await.unwrap();
        drop(client);

        let result: ProtocolResult<Option<WorkerReply>> =
            read_message(&mut server, MAX_REPLY_SIZE).await;
        assert!(matches!(result, Err(ProtocolError::IncompleteMessage { .. })));
    }
}
