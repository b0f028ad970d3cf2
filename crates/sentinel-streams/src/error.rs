//! Stream error types.

use thiserror::Error;

pub type StreamResult<T> = Result<T, StreamError>;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream not found: {0}")]
    NotFound(String),

    #[error("failed to open capture source: {0}")]
    CaptureOpen(String),

    #[error("frame read failed: {0}")]
    FrameRead(String),
}

impl StreamError {
    pub fn capture_open(msg: impl Into<String>) -> Self {
        Self::CaptureOpen(msg.into())
    }

    pub fn frame_read(msg: impl Into<String>) -> Self {
        Self::FrameRead(msg.into())
    }
}
