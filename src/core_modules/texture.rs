// THEORY:
// Gray-level co-occurrence (GLCM) texture statistics. For a pixel offset (distance d,
// direction theta) the co-occurrence matrix counts how often gray level i sits next to
// level j. The matrix is made symmetric (i next to j is also j next to i), normalized to
// a joint probability, and summarized by four classical Haralick properties:
//
// - contrast     sum P(i,j) (i - j)^2
// - correlation  sum P(i,j) (i - mu_i)(j - mu_j) / (sigma_i sigma_j), 1 for flat input
// - energy       sqrt(sum P(i,j)^2)
// - homogeneity  sum P(i,j) / (1 + (i - j)^2)
//
// Everything outside the fruit mask is zeroed first so the background contributes a
// single gray level instead of its own texture.

use image::GrayImage;

pub const GRAY_LEVELS: usize = 256;
pub const DISTANCES: [u32; 3] = [1, 2, 3];
pub const ANGLES: [f64; 4] = [
    0.0,
    std::f64::consts::FRAC_PI_4,
    std::f64::consts::FRAC_PI_2,
    3.0 * std::f64::consts::FRAC_PI_4,
];
pub const PROPERTIES: usize = 4;
pub const TEXTURE_FEATURES: usize = PROPERTIES * DISTANCES.len() * ANGLES.len();

/// Standard deviations below this make correlation undefined.
const FLAT_STD_DEV: f64 = 1e-15;

/// Haralick properties of one normalized co-occurrence matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureProperties {
    pub contrast: f64,
    pub correlation: f64,
    pub energy: f64,
    pub homogeneity: f64,
}

/// Zeroes every pixel outside the mask.
pub fn apply_mask(gray: &GrayImage, mask: &GrayImage) -> GrayImage {
    let mut masked = gray.clone();
    for (pixel, mask_pixel) in masked.pixels_mut().zip(mask.pixels()) {
        if mask_pixel.0[0] == 0 {
            pixel.0[0] = 0;
        }
    }
    masked
}

/// Symmetric, normalized co-occurrence matrix for one offset, row-major `[i * 256 + j]`.
pub fn co_occurrence(gray: &GrayImage, distance: u32, angle: f64) -> Vec<f64> {
    let (width, height) = (gray.width() as i64, gray.height() as i64);
    let offset_row = (angle.sin() * distance as f64).round() as i64;
    let offset_col = (angle.cos() * distance as f64).round() as i64;

    let mut matrix = vec![0.0f64; GRAY_LEVELS * GRAY_LEVELS];
    let start_row = (-offset_row).max(0);
    let end_row = height.min(height - offset_row);
    let start_col = (-offset_col).max(0);
    let end_col = width.min(width - offset_col);

    for row in start_row..end_row {
        for col in start_col..end_col {
            let i = gray.get_pixel(col as u32, row as u32).0[0] as usize;
            let j = gray.get_pixel((col + offset_col) as u32, (row + offset_row) as u32).0[0] as usize;
            matrix[i * GRAY_LEVELS + j] += 1.0;
            matrix[j * GRAY_LEVELS + i] += 1.0;
        }
    }

    let total: f64 = matrix.iter().sum();
    let total = if total == 0.0 { 1.0 } else { total };
    for value in matrix.iter_mut() {
        *value /= total;
    }
    matrix
}

pub fn properties(matrix: &[f64]) -> TextureProperties {
    let mut contrast = 0.0;
    let mut homogeneity = 0.0;
    let mut angular_second_moment = 0.0;
    let mut mean_i = 0.0;
    let mut mean_j = 0.0;

    for i in 0..GRAY_LEVELS {
        for j in 0..GRAY_LEVELS {
            let p = matrix[i * GRAY_LEVELS + j];
            if p == 0.0 {
                continue;
            }
            let difference = i as f64 - j as f64;
            contrast += p * difference * difference;
            homogeneity += p / (1.0 + difference * difference);
            angular_second_moment += p * p;
            mean_i += p * i as f64;
            mean_j += p * j as f64;
        }
    }

    let mut variance_i = 0.0;
    let mut variance_j = 0.0;
    let mut covariance = 0.0;
    for i in 0..GRAY_LEVELS {
        for j in 0..GRAY_LEVELS {
            let p = matrix[i * GRAY_LEVELS + j];
            if p == 0.0 {
                continue;
            }
            let di = i as f64 - mean_i;
            let dj = j as f64 - mean_j;
            variance_i += p * di * di;
            variance_j += p * dj * dj;
            covariance += p * di * dj;
        }
    }

    let (std_i, std_j) = (variance_i.sqrt(), variance_j.sqrt());
    let correlation = if std_i < FLAT_STD_DEV || std_j < FLAT_STD_DEV {
        1.0
    } else {
        covariance / (std_i * std_j)
    };

    TextureProperties {
        contrast,
        correlation,
        energy: angular_second_moment.sqrt(),
        homogeneity,
    }
}

/// 48 texture values ordered by property, then distance, then angle.
pub fn texture_features(gray: &GrayImage, mask: &GrayImage) -> [f64; TEXTURE_FEATURES] {
    let masked = apply_mask(gray, mask);

    let mut per_offset: Vec<TextureProperties> = Vec::with_capacity(DISTANCES.len() * ANGLES.len());
    for &distance in &DISTANCES {
        for &angle in &ANGLES {
            per_offset.push(properties(&co_occurrence(&masked, distance, angle)));
        }
    }

    let mut features = [0.0f64; TEXTURE_FEATURES];
    let block = per_offset.len();
    for (offset_index, props) in per_offset.iter().enumerate() {
        features[offset_index] = props.contrast;
        features[block + offset_index] = props.correlation;
        features[2 * block + offset_index] = props.energy;
        features[3 * block + offset_index] = props.homogeneity;
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn flat_image_has_textbook_properties() {
        let gray = GrayImage::from_pixel(32, 32, Luma([77]));
        let props = properties(&co_occurrence(&gray, 1, 0.0));
        assert_eq!(props.contrast, 0.0);
        assert_eq!(props.correlation, 1.0);
        assert!((props.energy - 1.0).abs() < 1e-12);
        assert!((props.homogeneity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn vertical_stripes_have_horizontal_contrast_only() {
        let gray = GrayImage::from_fn(32, 32, |x, _| Luma([if x % 2 == 0 { 0 } else { 10 }]));
        let horizontal = properties(&co_occurrence(&gray, 1, 0.0));
        let vertical = properties(&co_occurrence(&gray, 1, std::f64::consts::FRAC_PI_2));
        assert!((horizontal.contrast - 100.0).abs() < 1e-9);
        assert_eq!(vertical.contrast, 0.0);
        assert!((horizontal.correlation + 1.0).abs() < 1e-9);
    }

    #[test]
    fn matrix_is_symmetric_and_normalized() {
        let gray = GrayImage::from_fn(20, 20, |x, y| Luma([((x * 37 + y * 11) % 256) as u8]));
        let matrix = co_occurrence(&gray, 2, std::f64::consts::FRAC_PI_4);
        assert!((matrix.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        for i in (0..GRAY_LEVELS).step_by(17) {
            for j in (0..GRAY_LEVELS).step_by(13) {
                assert_eq!(matrix[i * GRAY_LEVELS + j], matrix[j * GRAY_LEVELS + i]);
            }
        }
    }

    #[test]
    fn masked_out_pixels_become_zero() {
        let gray = GrayImage::from_pixel(4, 4, Luma([200]));
        let mask = GrayImage::from_fn(4, 4, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
        let masked = apply_mask(&gray, &mask);
        assert_eq!(masked.get_pixel(0, 0).0[0], 200);
        assert_eq!(masked.get_pixel(3, 3).0[0], 0);
    }

    #[test]
    fn feature_layout_is_property_major() {
        let gray = GrayImage::from_pixel(16, 16, Luma([50]));
        let mask = GrayImage::from_pixel(16, 16, Luma([255]));
        let features = texture_features(&gray, &mask);
        assert_eq!(features.len(), 48);
        assert!(features[0..12].iter().all(|&v| v == 0.0));
        assert!(features[12..24].iter().all(|&v| v == 1.0));
        assert!(features[24..48].iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn tiny_images_do_not_panic() {
        let gray = GrayImage::from_pixel(2, 2, Luma([9]));
        let mask = GrayImage::from_pixel(2, 2, Luma([255]));
        let features = texture_features(&gray, &mask);
        assert!(features.iter().all(|v| v.is_finite()));
    }
}
