// THEORY:
// The `FeatureExtractor` is the contract between image processing and the statistical
// models. It concatenates three independent descriptors in a fixed order:
//
//   [ 0..48)   colour histogram (HSV, 16 bins per channel)
//   [48..80)   centroid-contour-distance shape signature
//   [80..128)  GLCM texture properties
//
// The models were fitted on exactly this layout, so the length and order never depend
// on image content.

use crate::core_modules::color_histogram::{color_histogram, COLOR_FEATURES};
use crate::core_modules::preprocessor::PreprocessedImage;
use crate::core_modules::shape_descriptor::{centroid_contour_distance, SHAPE_FEATURES};
use crate::core_modules::texture::{texture_features, TEXTURE_FEATURES};
use ndarray::{Array1, ArrayView1};

pub const FEATURE_LENGTH: usize = COLOR_FEATURES + SHAPE_FEATURES + TEXTURE_FEATURES;

/// A fixed-length, finite feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f64>);

impl FeatureVector {
    pub fn view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        self.0.as_slice().unwrap_or(&[])
    }

    pub fn color(&self) -> &[f64] {
        &self.as_slice()[..COLOR_FEATURES]
    }

    pub fn shape(&self) -> &[f64] {
        &self.as_slice()[COLOR_FEATURES..COLOR_FEATURES + SHAPE_FEATURES]
    }

    pub fn texture(&self) -> &[f64] {
        &self.as_slice()[COLOR_FEATURES + SHAPE_FEATURES..]
    }
}

#[derive(Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn extract(&self, image: &PreprocessedImage) -> FeatureVector {
        let mut values = Vec::with_capacity(FEATURE_LENGTH);
        values.extend_from_slice(&color_histogram(&image.hsv_image));
        values.extend_from_slice(&centroid_contour_distance(&image.mask, image.mask_origin));
        values.extend_from_slice(&texture_features(&image.equalized_gray, &image.mask));

        // Every component is epsilon-guarded; this only protects the model input.
        for value in values.iter_mut() {
            if !value.is_finite() {
                *value = 0.0;
            }
        }

        FeatureVector(Array1::from(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::preprocessor::Preprocessor;
    use crate::test_support::red_ellipse_on_green;
    use image::{Rgb, RgbImage};

    fn extract(image: &RgbImage) -> FeatureVector {
        FeatureExtractor.extract(&Preprocessor::new().run(image))
    }

    #[test]
    fn length_is_fixed_for_any_content() {
        let images = [
            RgbImage::new(1, 1),
            RgbImage::from_pixel(50, 50, Rgb([255, 255, 255])),
            RgbImage::from_pixel(10, 300, Rgb([200, 30, 20])),
            RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 31 % 256) as u8, (y * 17 % 256) as u8, ((x ^ y) % 256) as u8])),
            red_ellipse_on_green(),
        ];
        for image in &images {
            let features = extract(image);
            assert_eq!(features.len(), FEATURE_LENGTH);
            assert!(features.as_slice().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn color_block_sums_to_one() {
        let features = extract(&red_ellipse_on_green());
        let sum: f64 = features.color().iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn solid_colour_gives_three_equal_histogram_peaks() {
        let features = extract(&RgbImage::from_pixel(80, 60, Rgb([20, 120, 200])));
        let peaks: Vec<f64> = features.color().iter().cloned().filter(|&v| v > 0.0).collect();
        assert_eq!(peaks.len(), 3);
        assert!(peaks.iter().all(|&v| (v - 1.0 / 3.0).abs() < 1e-6));
    }

    #[test]
    fn black_image_has_zero_shape_block() {
        let features = extract(&RgbImage::new(120, 90));
        assert!(features.shape().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn ellipse_has_a_real_outline() {
        let features = extract(&red_ellipse_on_green());
        assert!(features.shape().iter().any(|&v| v > 0.0));
        assert!(features.shape().iter().all(|&v| v <= 1.0));
    }

    #[test]
    fn extraction_is_deterministic() {
        let image = red_ellipse_on_green();
        assert_eq!(extract(&image), extract(&image));
    }
}
