//! Frame I/O over one peer connection.
//!
//! Reads are owned by the session's reader loop. Writes go through a
//! [`FrameWriter`] whose mutex keeps whole frames from interleaving.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;
use umbra_wire::levin::RETURN_OK;
use umbra_wire::{frame, LevinHeader, Message, HEADER_LENGTH};

use crate::error::{NodeError, NodeResult};

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Header
    pub header: LevinHeader,
    /// Portable-storage payload
    pub payload: Vec<u8>,
}

fn map_read_error(err: std::io::Error) -> NodeError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        NodeError::Closed
    } else {
        NodeError::Io(err)
    }
}

/// Read one frame, checking the header against `max_payload` before any
/// payload byte is read.
///
/// # Errors
///
/// [`NodeError::Closed`] at end of stream, [`NodeError::Frame`] for a bad
/// header, [`NodeError::Io`] otherwise.
pub async fn read_frame<R>(reader: &mut R, max_payload: u64) -> NodeResult<Frame>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_LENGTH];
    reader.read_exact(&mut raw).await.map_err(map_read_error)?;
    let header = LevinHeader::from_bytes(&raw, max_payload)?;

    let length = usize::try_from(header.length).map_err(|_| {
        NodeError::from(umbra_wire::WireError::FrameTooLarge {
            length: header.length,
            max: max_payload,
        })
    })?;
    let mut payload = vec![0u8; length];
    if length > 0 {
        reader
            .read_exact(&mut payload)
            .await
            .map_err(map_read_error)?;
    }
    Ok(Frame { header, payload })
}

/// Frame a request or notification.
///
/// # Errors
///
/// [`NodeError::Codec`] if the message cannot be encoded.
pub fn request_frame<M: Message>(message: &M) -> NodeResult<Vec<u8>> {
    let payload = message.to_payload()?;
    Ok(frame(
        &LevinHeader::request(M::COMMAND, payload.len() as u64),
        &payload,
    ))
}

/// Frame a successful response.
///
/// # Errors
///
/// [`NodeError::Codec`] if the message cannot be encoded.
pub fn response_frame<M: Message>(message: &M) -> NodeResult<Vec<u8>> {
    let payload = message.to_payload()?;
    Ok(frame(
        &LevinHeader::response(M::COMMAND, payload.len() as u64, RETURN_OK),
        &payload,
    ))
}

/// Serialized writer with a per-frame ceiling.
pub struct FrameWriter<W> {
    inner: Arc<Mutex<W>>,
    timeout: Duration,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// Wrap the write half of a connection.
    pub fn new(writer: W, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
            timeout,
        }
    }

    /// Write one already-framed message.
    ///
    /// # Errors
    ///
    /// [`NodeError::Timeout`] past the write ceiling, [`NodeError::Io`].
    pub async fn write_frame(&self, bytes: &[u8]) -> NodeResult<()> {
        let mut writer = self.inner.lock().await;
        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };
        match tokio::time::timeout(self.timeout, write).await {
            Ok(result) => result.map_err(NodeError::Io),
            Err(_) => Err(NodeError::Timeout {
                operation: "write",
                after: self.timeout,
            }),
        }
    }

    /// Send a request or notification.
    ///
    /// # Errors
    ///
    /// As [`FrameWriter::write_frame`], plus encoding errors.
    pub async fn send<M: Message>(&self, message: &M) -> NodeResult<()> {
        self.write_frame(&request_frame(message)?).await
    }

    /// Close the write half. Failures are logged; the connection is being
    /// dropped either way.
    pub async fn shutdown(&self) {
        let mut writer = self.inner.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("[SESSION] Write half shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_wire::p2p::PingRequest;
    use umbra_wire::Command;

    #[tokio::test]
    async fn test_frame_round_trip_over_pipe() {
        let (client, mut server) = tokio::io::duplex(1024);
        let writer = FrameWriter::new(client, Duration::from_secs(1));
        writer.send(&PingRequest).await.unwrap();

        let frame = read_frame(&mut server, 1024).await.unwrap();
        assert_eq!(frame.header.command, Command::Ping);
        assert!(frame.header.expects_response);
        assert_eq!(PingRequest::from_payload(&frame.payload).unwrap(), PingRequest);
    }

    #[tokio::test]
    async fn test_empty_payload_returns_immediately() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let header = LevinHeader::request(Command::Unknown(3000), 0);
        client.write_all(&header.to_bytes()).await.unwrap();

        let frame = read_frame(&mut server, 64).await.unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(frame.header.command, Command::Unknown(3000));
    }

    #[tokio::test]
    async fn test_oversized_header_is_frame_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let header = LevinHeader::request(Command::NewBlock, 0x1_0000_0000_0001);
        client.write_all(&header.to_bytes()).await.unwrap();

        let err = read_frame(&mut server, 100 * 1024 * 1024).await.unwrap_err();
        assert!(matches!(err, NodeError::Frame(_)));
        assert!(err.is_session_fatal());
    }

    #[tokio::test]
    async fn test_eof_is_closed() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(matches!(
            read_frame(&mut server, 64).await,
            Err(NodeError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_signals_eof() {
        let (client, mut server) = tokio::io::duplex(1024);
        let writer = FrameWriter::new(client, Duration::from_secs(1));
        writer.send(&PingRequest).await.unwrap();
        writer.shutdown().await;

        assert!(read_frame(&mut server, 1024).await.is_ok());
        assert!(matches!(
            read_frame(&mut server, 1024).await,
            Err(NodeError::Closed)
        ));
    }
}
