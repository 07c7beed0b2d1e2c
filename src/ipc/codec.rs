//! Length-prefixed frame codec.
//!
//! Wire layout: `u32` big-endian payload length, one type byte, then the
//! payload (JSON). The length counts the payload only, not the type byte.

use crate::types::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub const MSG_REQUEST: u8 = 0x01;
pub const MSG_RESPONSE: u8 = 0x02;
pub const MSG_NOTIFICATION: u8 = 0x03;
pub const MSG_ERROR: u8 = 0xFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn request(payload: Vec<u8>) -> Self {
        Self { msg_type: MSG_REQUEST, payload }
    }

    pub fn response(payload: Vec<u8>) -> Self {
        Self { msg_type: MSG_RESPONSE, payload }
    }

    pub fn notification(payload: Vec<u8>) -> Self {
        Self { msg_type: MSG_NOTIFICATION, payload }
    }

    pub fn error(payload: Vec<u8>) -> Self {
        Self { msg_type: MSG_ERROR, payload }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

/// Read one frame. `Ok(None)` on a clean EOF at a frame boundary.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> Result<Option<Frame>>
where
    R: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_bytes {
        return Err(Error::internal(format!(
            "frame of {} bytes exceeds limit of {}",
            len, max_frame_bytes
        )));
    }

    let mut type_buf = [0u8; 1];
    reader.read_exact(&mut type_buf).await?;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame { msg_type: type_buf[0], payload }))
}

/// Write one frame and flush. The flush is part of the contract: callers
/// sequence protocol steps on this function returning.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    let len = u32::try_from(frame.payload.len())
        .map_err(|_| Error::internal("frame payload exceeds u32 length"))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&[frame.msg_type]).await?;
    writer.write_all(&frame.payload).await?;
    writer.flush().await?;
    Ok(())
}
