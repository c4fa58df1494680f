//! Colour distribution descriptor: 16 bins per HSV channel, L1-normalized as one vector.

use crate::core_modules::color_space::color_space::{HsvImage, HUE_RANGE};
use crate::core_modules::filters::EPSILON;

pub const BINS_PER_CHANNEL: usize = 16;
pub const COLOR_FEATURES: usize = 3 * BINS_PER_CHANNEL;

/// Native range of each stored channel: hue is halved, saturation and value are bytes.
const CHANNEL_RANGES: [f64; 3] = [HUE_RANGE as f64, 256.0, 256.0];

pub fn color_histogram(hsv: &HsvImage) -> [f64; COLOR_FEATURES] {
    let mut histogram = [0.0f64; COLOR_FEATURES];

    for pixel in hsv.pixels() {
        for (channel, range) in CHANNEL_RANGES.iter().enumerate() {
            let bin = ((pixel.0[channel] as f64 * BINS_PER_CHANNEL as f64 / range) as usize).min(BINS_PER_CHANNEL - 1);
            histogram[channel * BINS_PER_CHANNEL + bin] += 1.0;
        }
    }

    let total: f64 = histogram.iter().sum();
    for value in histogram.iter_mut() {
        *value /= total + EPSILON;
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn histogram_sums_to_one() {
        let hsv = HsvImage::from_fn(50, 40, |x, y| Rgb([(x * 3 % 180) as u8, (y * 6) as u8, (x + y) as u8]));
        let sum: f64 = color_histogram(&hsv).iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn solid_colour_puts_a_third_in_one_bin_per_channel() {
        let hsv = HsvImage::from_pixel(32, 32, Rgb([179, 0, 255]));
        let histogram = color_histogram(&hsv);
        let occupied: Vec<usize> = (0..COLOR_FEATURES).filter(|&i| histogram[i] > 0.0).collect();
        assert_eq!(occupied, vec![15, 16, 47]);
        for index in occupied {
            assert!((histogram[index] - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn hue_uses_its_own_range() {
        // Hue 90 is the middle of [0, 180) and lands in bin 8, not bin 5.
        let hsv = HsvImage::from_pixel(4, 4, Rgb([90, 0, 0]));
        assert!(color_histogram(&hsv)[8] > 0.0);
    }
}
