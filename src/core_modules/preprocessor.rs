// THEORY:
// The `Preprocessor` turns an arbitrary decoded photo into the four canonical 224x224
// views the feature extractor reads. It owns no state: `run` is a straight
// composition of pure stages, each producing a new buffer.
//
//   white balance -> bilateral denoise -> HSV segmentation -> mask-aware crop
//   -> canonical resize -> CLAHE on V -> global equalization of gray
//
// Degenerate inputs (solid colours, black frames) never fail here. They flow through
// the documented fallbacks and are marked by `MaskOrigin::Fallback`.

use crate::core_modules::color_space::color_space::{hsv_to_rgb, rgb_to_hsv, to_grayscale, HsvImage};
use crate::core_modules::filters::{
    bilateral_filter, gray_world_balance, BILATERAL_DIAMETER, BILATERAL_SIGMA_COLOR, BILATERAL_SIGMA_SPACE,
};
use crate::core_modules::grid_manager::GridManager;
use crate::core_modules::region::BoundingBox;
use crate::core_modules::segmentation::{crop_to_foreground, segment, MaskOrigin};
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::contrast::equalize_histogram;

/// Side length of every canonical output.
pub const CANONICAL_SIZE: u32 = 224;

/// Everything the feature extractor needs, all at `CANONICAL_SIZE`.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// Binary {0, 255} fruit mask.
    pub mask: GrayImage,
    /// Contrast-enhanced colour image.
    pub enhanced_image: RgbImage,
    /// HSV view of `enhanced_image`.
    pub hsv_image: HsvImage,
    /// Globally equalized grayscale of `enhanced_image`.
    pub equalized_gray: GrayImage,
    /// Whether `mask` came from a real blob or the whole-image fallback.
    pub mask_origin: MaskOrigin,
    /// The crop rectangle in the coordinates of the denoised input.
    pub crop: BoundingBox,
}

/// Stateless preprocessing pipeline.
#[derive(Default)]
pub struct Preprocessor {
    contrast: GridManager,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self, image: &RgbImage) -> PreprocessedImage {
        // --- 1. Illumination and noise ---
        let balanced = gray_world_balance(image);
        let denoised = bilateral_filter(&balanced, BILATERAL_DIAMETER, BILATERAL_SIGMA_COLOR, BILATERAL_SIGMA_SPACE);

        // --- 2. Segmentation and crop ---
        let segmentation = segment(&rgb_to_hsv(&denoised));
        let (cropped_image, cropped_mask, crop) = crop_to_foreground(&denoised, &segmentation);

        // --- 3. Canonical size ---
        let resized = imageops::resize(&cropped_image, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle);
        let mask = imageops::resize(&cropped_mask, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Nearest);

        // --- 4. Local contrast on V, then global equalization ---
        let mut resized_hsv = rgb_to_hsv(&resized);
        self.contrast.equalize_value_channel(&mut resized_hsv);
        let enhanced_image = hsv_to_rgb(&resized_hsv);
        let hsv_image = rgb_to_hsv(&enhanced_image);
        let equalized_gray = equalize_histogram(&to_grayscale(&enhanced_image));

        PreprocessedImage {
            mask,
            enhanced_image,
            hsv_image,
            equalized_gray,
            mask_origin: segmentation.origin,
            crop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::utils::image_helper::image_helper::{decode_png, encode_png};
    use crate::test_support::{red_ellipse_on_green, ELLIPSE_BOUNDS};
    use image::Rgb;

    #[test]
    fn outputs_are_canonical() {
        let image = RgbImage::from_fn(97, 41, |x, y| Rgb([(x * 2) as u8, (y * 5) as u8, 90]));
        let output = Preprocessor::new().run(&image);
        for dims in [
            output.mask.dimensions(),
            output.enhanced_image.dimensions(),
            output.hsv_image.dimensions(),
            output.equalized_gray.dimensions(),
        ] {
            assert_eq!(dims, (CANONICAL_SIZE, CANONICAL_SIZE));
        }
    }

    #[test]
    fn black_image_uses_fallback_and_skips_crop() {
        let output = Preprocessor::new().run(&RgbImage::new(64, 48));
        assert_eq!(output.mask_origin, MaskOrigin::Fallback);
        assert_eq!(output.crop, BoundingBox::full(64, 48));
        assert!(output.mask.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn ellipse_is_isolated_and_tightly_cropped() {
        let output = Preprocessor::new().run(&red_ellipse_on_green());
        assert_eq!(output.mask_origin, MaskOrigin::Segmented);

        let foreground = output.mask.pixels().filter(|p| p.0[0] == 255).count();
        assert!(foreground > 0);
        assert!(foreground < (CANONICAL_SIZE * CANONICAL_SIZE) as usize);

        // Ellipse box plus 5% padding, a few pixels of slack for the smoothed boundary.
        let (min_x, min_y, max_x, max_y) = ELLIPSE_BOUNDS;
        let pad_x = ((max_x - min_x + 1) as f64 * 0.05) as i64;
        let pad_y = ((max_y - min_y + 1) as f64 * 0.05) as i64;
        let slack = 3;
        assert!((output.crop.min.x as i64 - (min_x as i64 - pad_x)).abs() <= slack, "{:?}", output.crop);
        assert!((output.crop.min.y as i64 - (min_y as i64 - pad_y)).abs() <= slack, "{:?}", output.crop);
        assert!((output.crop.max.x as i64 - (max_x as i64 + pad_x)).abs() <= slack, "{:?}", output.crop);
        assert!((output.crop.max.y as i64 - (max_y as i64 + pad_y)).abs() <= slack, "{:?}", output.crop);
    }

    #[test]
    fn resized_mask_survives_png_round_trip_as_binary() {
        let output = Preprocessor::new().run(&red_ellipse_on_green());
        let encoded = encode_png(&output.mask).expect("encoding an in-memory mask");
        let decoded = decode_png(&encoded).expect("decoding what was just encoded");
        assert_eq!(decoded.dimensions(), output.mask.dimensions());
        assert!(decoded.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert!(decoded.pixels().any(|p| p.0[0] == 0));
    }
}
