pub mod image_helper {
    use image::codecs::png::{PngDecoder, PngEncoder};
    use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, RgbImage};
    use std::io::Cursor;
    use std::path::Path;

    /// Encodes a single-channel image as PNG bytes.
    pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, image::error::ImageError> {
        let mut bytes = Vec::new();
        let encoder = PngEncoder::new(&mut bytes);
        encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)?;
        Ok(bytes)
    }

    /// Decodes PNG bytes into a single-channel image.
    pub fn decode_png(bytes: &[u8]) -> Result<GrayImage, image::error::ImageError> {
        let decoder = PngDecoder::new(Cursor::new(bytes))?;
        Ok(DynamicImage::from_decoder(decoder)?.into_luma8())
    }

    pub fn save_gray(path: &Path, image: &GrayImage) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = PngEncoder::new(output);
        encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)?;
        Ok(())
    }

    pub fn save_rgb(path: &Path, image: &RgbImage) -> Result<(), image::error::ImageError> {
        let output = std::fs::File::create(path)?;
        let encoder = PngEncoder::new(output);
        encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)?;
        Ok(())
    }
}
