// THEORY:
// Whole-image filters that run before segmentation. Both are pure: they borrow the
// input and return a new buffer of the same size.
//
// 1.  **Gray-world white balance** rescales each channel so that its mean matches the
//     mean of all three channel means. Illumination casts shift every pixel of one
//     channel together, so equalizing the averages removes most of the cast before any
//     hue threshold is applied.
// 2.  **Bilateral denoising** averages each pixel with the neighbours that are both
//     spatially close and similar in colour. Sensor noise is flattened while the strong
//     colour step at the fruit boundary is kept.

use image::{Rgb, RgbImage};

/// Additive guard for every mean/ratio division.
pub const EPSILON: f64 = 1e-6;

/// Bilateral window diameter in pixels.
pub const BILATERAL_DIAMETER: u32 = 9;
pub const BILATERAL_SIGMA_COLOR: f64 = 75.0;
pub const BILATERAL_SIGMA_SPACE: f64 = 75.0;

/// Gray-world white balance. Channels are scaled by `global_mean / channel_mean` and
/// clipped to the byte range.
pub fn gray_world_balance(image: &RgbImage) -> RgbImage {
    let pixel_count = (image.width() as u64 * image.height() as u64).max(1) as f64;
    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0.iter()) {
            *sum += *channel as u64;
        }
    }

    let means = sums.map(|sum| sum as f64 / pixel_count);
    let global_mean = means.iter().sum::<f64>() / 3.0;
    let gains = means.map(|mean| global_mean / (mean + EPSILON));

    let mut balanced = RgbImage::new(image.width(), image.height());
    for (source, target) in image.pixels().zip(balanced.pixels_mut()) {
        let mut scaled = [0u8; 3];
        for channel in 0..3 {
            scaled[channel] = (source.0[channel] as f64 * gains[channel]).round().clamp(0.0, 255.0) as u8;
        }
        *target = Rgb(scaled);
    }
    balanced
}

/// Edge-preserving bilateral smoothing over a circular window.
///
/// Colour distance is the sum of absolute channel differences; the colour and spatial
/// Gaussian weights are tabulated once per call. Borders reflect without repeating the
/// edge pixel.
pub fn bilateral_filter(image: &RgbImage, diameter: u32, sigma_color: f64, sigma_space: f64) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let radius = (diameter / 2) as i64;
    let color_coefficient = -0.5 / (sigma_color * sigma_color);
    let space_coefficient = -0.5 / (sigma_space * sigma_space);

    // Sum of three absolute differences tops out at 3 * 255.
    let color_weights: Vec<f64> = (0..=765)
        .map(|distance| ((distance * distance) as f64 * color_coefficient).exp())
        .collect();

    let mut window: Vec<(i64, i64, f64)> = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let squared = (dx * dx + dy * dy) as f64;
            if squared.sqrt() <= radius as f64 {
                window.push((dx, dy, (squared * space_coefficient).exp()));
            }
        }
    }

    let mut filtered = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let center = image.get_pixel(x, y).0;
            let mut accumulated = [0.0f64; 3];
            let mut total_weight = 0.0f64;

            for &(dx, dy, space_weight) in &window {
                let nx = reflect_101(x as i64 + dx, width);
                let ny = reflect_101(y as i64 + dy, height);
                let neighbour = image.get_pixel(nx, ny).0;

                let distance: usize = center
                    .iter()
                    .zip(neighbour.iter())
                    .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs() as usize)
                    .sum();
                let weight = space_weight * color_weights[distance];

                for channel in 0..3 {
                    accumulated[channel] += neighbour[channel] as f64 * weight;
                }
                total_weight += weight;
            }

            let value = accumulated.map(|sum| (sum / (total_weight + EPSILON)).round().clamp(0.0, 255.0) as u8);
            filtered.put_pixel(x, y, Rgb(value));
        }
    }
    filtered
}

/// Mirrors an out-of-range coordinate back into `[0, len)` without repeating the edge.
pub(crate) fn reflect_101(position: i64, len: u32) -> u32 {
    let len = len as i64;
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut wrapped = position.rem_euclid(period);
    if wrapped >= len {
        wrapped = period - wrapped;
    }
    wrapped as u32
}
