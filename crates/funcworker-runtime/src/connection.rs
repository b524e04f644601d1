//! Framed reading and writing over an async byte stream.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use funcworker_protocol::{ProtocolError, ProtocolResult, check_frame_len, encode_message_with_limit};

/// Reads length-prefixed JSON frames.
pub struct FrameReader<R> {
    inner: R,
    max: u32,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max: u32) -> Self {
        Self { inner, max }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the stream at a frame boundary.
    pub async fn read_message<T: DeserializeOwned>(&mut self) -> ProtocolResult<Option<T>> {
        let mut len_buf = [0u8; 4];
        let mut filled = 0;
        while filled < len_buf.len() {
            let n = self.inner.read(&mut len_buf[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ProtocolError::IncompleteMessage {
                    expected: 4,
                    received: filled,
                });
            }
            filled += n;
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        check_frame_len(len, self.max)?;

        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::IncompleteMessage {
                    expected: 4 + len,
                    received: 4,
                }
            } else {
                e.into()
            }
        })?;
        trace!(len, "read frame");

        Ok(Some(serde_json::from_slice(&payload)?))
    }
}

/// Writes length-prefixed JSON frames.
pub struct FrameWriter<W> {
    inner: W,
    max: u32,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W, max: u32) -> Self {
        Self { inner, max }
    }

    /// Writes one frame and flushes it.
    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> ProtocolResult<()> {
        let buffer = encode_message_with_limit(message, self.max)?;
        self.inner.write_all(&buffer).await?;
        self.inner.flush().await?;
        trace!(len = buffer.len() - 4, "wrote frame");
        Ok(())
    }

    /// Shuts down the write half.
    pub async fn shutdown(&mut self) -> ProtocolResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
