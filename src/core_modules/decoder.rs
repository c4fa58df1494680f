// THEORY:
// The decoder is the boundary between caller bytes and the pixel pipeline. Any raster
// format the `image` crate recognizes is accepted; the result is always 8-bit RGB so
// every later stage can assume three channels. Alpha is dropped, 16-bit and gray
// sources are converted.

use crate::error::{ChiliError, Result};
use image::RgbImage;

/// Decodes raw bytes into a 3-channel image.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(ChiliError::Decode("empty image buffer".to_string()));
    }

    let decoded = image::load_from_memory(bytes).map_err(|e| ChiliError::Decode(e.to_string()))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ChiliError::Decode("image has no pixels".to_string()));
    }
    Ok(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn rgba_png_decodes_to_rgb() {
        let source = RgbaImage::from_pixel(6, 4, Rgba([10, 20, 30, 128]));
        let mut bytes = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");

        let decoded = decode_image(&bytes).expect("valid png");
        assert_eq!(decoded.dimensions(), (6, 4));
        assert_eq!(*decoded.get_pixel(0, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let error = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(error, ChiliError::Decode(_)));
    }

    #[test]
    fn empty_buffer_is_a_decode_error() {
        assert!(matches!(decode_image(&[]), Err(ChiliError::Decode(_))));
    }
}
