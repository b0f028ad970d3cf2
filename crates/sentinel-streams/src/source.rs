//! Capture-source seams and the built-in MJPEG-over-HTTP source.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use sentinel_vision::image::{self, DynamicImage, ImageFormat};
use tracing::info;

use crate::error::{StreamError, StreamResult};

/// Upper bound on buffered bytes while hunting for a JPEG boundary.
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// An open capture source yielding frames in arrival order.
#[async_trait]
pub trait FrameSource: Send {
    async fn read_frame(&mut self) -> StreamResult<DynamicImage>;
}

/// Opens capture sources. The capture layer stays opaque behind this seam;
/// workers only see frames.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Open `source`. The target resolution is a request, not a guarantee;
    /// implementations log what they actually achieve.
    async fn connect(
        &self,
        source: &str,
        target_width: u32,
        target_height: u32,
    ) -> StreamResult<Box<dyn FrameSource>>;
}

/// Connector for MJPEG-over-HTTP cameras.
#[derive(Debug, Default)]
pub struct MjpegConnector;

#[async_trait]
impl SourceConnector for MjpegConnector {
    async fn connect(
        &self,
        source: &str,
        target_width: u32,
        target_height: u32,
    ) -> StreamResult<Box<dyn FrameSource>> {
        if !source.starts_with("http://") && !source.starts_with("https://") {
            return Err(StreamError::capture_open(format!(
                "unsupported capture source '{source}': only http(s) MJPEG streams are built in"
            )));
        }

        let response = reqwest::Client::new()
            .get(source)
            .send()
            .await
            .map_err(|e| StreamError::capture_open(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StreamError::capture_open(format!(
                "HTTP {} from {source}",
                response.status()
            )));
        }

        info!(
            source,
            target_width, target_height, "opened MJPEG source; requested resolution is advisory"
        );
        Ok(Box::new(MjpegSource {
            stream: Box::pin(response.bytes_stream()),
            buffer: BytesMut::new(),
        }))
    }
}

/// Reads frames out of a multipart MJPEG byte stream by scanning for JPEG
/// SOI/EOI markers; part headers between frames are skipped implicitly.
pub struct MjpegSource {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    buffer: BytesMut,
}

#[async_trait]
impl FrameSource for MjpegSource {
    async fn read_frame(&mut self) -> StreamResult<DynamicImage> {
        loop {
            if let Some(jpeg) = extract_jpeg(&mut self.buffer) {
                return image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
                    .map_err(|e| StreamError::frame_read(e.to_string()));
            }
            if self.buffer.len() > MAX_FRAME_BYTES {
                self.buffer.clear();
                return Err(StreamError::frame_read(
                    "no JPEG boundary within buffer limit",
                ));
            }
            match self.stream.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(StreamError::frame_read(e.to_string())),
                None => return Err(StreamError::frame_read("stream ended")),
            }
        }
    }
}

/// Pull one complete JPEG (SOI..EOI inclusive) off the front of the buffer.
fn extract_jpeg(buffer: &mut BytesMut) -> Option<Vec<u8>> {
    let start = find_marker(buffer, &[0xFF, 0xD8])?;
    let end_rel = find_marker(&buffer[start + 2..], &[0xFF, 0xD9])?;
    let end = start + 2 + end_rel + 2;
    let frame = buffer[start..end].to_vec();
    let _ = buffer.split_to(end);
    Some(frame)
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_jpeg_skips_part_headers() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
        buffer.extend_from_slice(&[0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9]);
        buffer.extend_from_slice(b"\r\n--frame\r\n");

        let frame = extract_jpeg(&mut buffer).expect("frame found");
        assert_eq!(frame.first(), Some(&0xFF));
        assert_eq!(frame[1], 0xD8);
        assert_eq!(&frame[frame.len() - 2..], &[0xFF, 0xD9]);
        // Remainder keeps the next part boundary.
        assert!(buffer.starts_with(b"\r\n--frame"));
    }

    #[test]
    fn test_extract_jpeg_waits_for_complete_frame() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&[0xFF, 0xD8, 0x01, 0x02]);
        assert!(extract_jpeg(&mut buffer).is_none());
        // Buffer untouched until the EOI arrives.
        assert_eq!(buffer.len(), 4);

        buffer.extend_from_slice(&[0xFF, 0xD9]);
        assert!(extract_jpeg(&mut buffer).is_some());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_two_frames_come_out_in_order() {
        let mut buffer = BytesMut::new();
        buffer.extend_from_slice(&[0xFF, 0xD8, 0xAA, 0xFF, 0xD9]);
        buffer.extend_from_slice(&[0xFF, 0xD8, 0xBB, 0xFF, 0xD9]);

        let first = extract_jpeg(&mut buffer).unwrap();
        let second = extract_jpeg(&mut buffer).unwrap();
        assert_eq!(first[2], 0xAA);
        assert_eq!(second[2], 0xBB);
        assert!(extract_jpeg(&mut buffer).is_none());
    }

    #[tokio::test]
    async fn test_non_http_source_is_rejected() {
        let connector = MjpegConnector;
        let result = connector.connect("0", 1280, 720).await;
        assert!(matches!(result, Err(StreamError::CaptureOpen(_))));
    }
}
