//! Message framing for the length-prefixed stream protocol.
//!
//! Format: `[4 bytes little-endian length][payload]`. Outbound frames are
//! built once with [`frame`] and shared between every recipient.

use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::MAX_MESSAGE_SIZE;
use crate::net::protocol::{encode, EncodeError, ServerMessage};

/// A complete, length-prefixed outbound frame
pub type Frame = Arc<[u8]>;

/// Errors that can occur during message framing
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Prefix `payload` with its length
pub fn frame_bytes(payload: &[u8]) -> Result<Frame, FramingError> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(payload.len(), MAX_MESSAGE_SIZE));
    }
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf.into())
}

/// Encode and frame a server message
pub fn frame(message: &ServerMessage) -> Result<Frame, FramingError> {
    frame_bytes(&encode(message)?)
}

/// Read one length-prefixed payload from a stream
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(FramingError::ConnectionClosed);
        }
        Err(e) => return Err(FramingError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; len];
    match stream.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FramingError::ConnectionClosed),
        Err(e) => Err(FramingError::Io(e)),
    }
}

/// Write an already framed message and flush
pub async fn write_frame<W: AsyncWrite + Unpin>(stream: &mut W, frame: &[u8]) -> Result<(), FramingError> {
    stream.write_all(frame).await?;
    stream.flush().await?;
    Ok(())
}
