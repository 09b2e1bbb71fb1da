//! Image encoding: `RgbImage` → base64 PNG wrapped in `ImageData`.
//!
//! Remote vision models take images as base64 data embedded in the JSON
//! request body. PNG is lossless, so glyph edges survive intact; JPEG ringing
//! around small print measurably hurts recognition.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// PNG-encode a page image.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Encode a page as a base64 PNG ready for a vision API.
///
/// `detail: "high"` asks OpenAI-style APIs to tile the image at full
/// resolution instead of a single low-res overview, which loses fine print.
pub fn encode_page(img: &RgbImage) -> Result<ImageData, image::ImageError> {
    let png = encode_png(img)?;
    let b64 = STANDARD.encode(&png);
    debug!(
        "Encoded {}x{} page → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn encode_small_image() {
        let img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }

    #[test]
    fn png_round_trips_dimensions() {
        let img = RgbImage::from_pixel(17, 5, Rgb([1, 2, 3]));
        let png = encode_png(&img).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert_eq!((back.width(), back.height()), (17, 5));
    }
}
