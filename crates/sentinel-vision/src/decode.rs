//! Image payload decoding and JPEG helpers.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::{VisionError, VisionResult};

/// Decode a base64 payload into an image. Accepts both bare base64 and
/// `data:image/...;base64,` URLs.
pub fn decode_base64_image(data: &str) -> VisionResult<DynamicImage> {
    let payload = data
        .split_once(',')
        .map(|(_, rest)| rest)
        .unwrap_or(data);
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| VisionError::Decode(e.to_string()))?;
    image::load_from_memory(&bytes).map_err(|e| VisionError::Decode(e.to_string()))
}

/// Encode an image as JPEG bytes.
pub fn encode_jpeg(img: &DynamicImage) -> VisionResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|e| VisionError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Crop a box out of a frame, clipped to image bounds. Falls back to the
/// full frame when the clipped region is empty.
pub fn crop_box(img: &DynamicImage, x1: f32, y1: f32, x2: f32, y2: f32) -> DynamicImage {
    let (w, h) = img.dimensions();
    let cx1 = x1.max(0.0) as u32;
    let cy1 = y1.max(0.0) as u32;
    let cx2 = (x2.max(0.0) as u32).min(w.saturating_sub(1));
    let cy2 = (y2.max(0.0) as u32).min(h.saturating_sub(1));

    if cx2 > cx1 && cy2 > cy1 {
        img.crop_imm(cx1, cy1, cx2 - cx1, cy2 - cy1)
    } else {
        img.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn test_frame(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb([40, 80, 120])))
    }

    #[test]
    fn test_roundtrip_bare_base64() {
        let jpeg = encode_jpeg(&test_frame(32, 24)).unwrap();
        let encoded = STANDARD.encode(&jpeg);
        let decoded = decode_base64_image(&encoded).unwrap();
        assert_eq!(decoded.dimensions(), (32, 24));
    }

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let jpeg = encode_jpeg(&test_frame(16, 16)).unwrap();
        let url = format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg));
        assert!(decode_base64_image(&url).is_ok());
    }

    #[test]
    fn test_invalid_payloads_fail() {
        assert!(matches!(
            decode_base64_image("!!not-base64!!"),
            Err(VisionError::Decode(_))
        ));
        // Valid base64, not an image.
        let not_image = STANDARD.encode(b"hello world");
        assert!(decode_base64_image(&not_image).is_err());
    }

    #[test]
    fn test_crop_clips_to_bounds() {
        let frame = test_frame(100, 80);
        let crop = crop_box(&frame, 50.0, 40.0, 500.0, 400.0);
        assert_eq!(crop.dimensions(), (49, 39));
    }

    #[test]
    fn test_degenerate_crop_falls_back_to_frame() {
        let frame = test_frame(100, 80);
        let crop = crop_box(&frame, 90.0, 70.0, 20.0, 10.0);
        assert_eq!(crop.dimensions(), (100, 80));
    }
}
