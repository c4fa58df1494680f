// THEORY:
// The `GridManager` orchestrates contrast-limited adaptive histogram equalization over
// a fixed grid of `Chunk`s. It is not an analyzer itself: it slices the image into
// tiles, asks each tile for its lookup table, and then blends the tables back into a
// single output image.
//
// Key architectural principles:
// 1.  **Data Transformation**: Slicing the image into a `grid_width x grid_height` grid
//     of tiles is the bridge between the raw channel and the per-tile statistics. When
//     the image does not divide evenly, tiles are sized up and the missing samples are
//     read from a mirrored border so every tile holds the same number of samples.
// 2.  **Orchestration**: Every tile computes its own table independently.
// 3.  **Bilinear Blending**: Each output sample mixes the four tables whose tile centres
//     surround it. Without this step the tile seams would show as hard steps.

use crate::core_modules::chunk::chunk::{Chunk, Lut};
use crate::core_modules::color_space::color_space::HsvImage;
use crate::core_modules::filters::reflect_101;
use image::{GrayImage, Luma};

pub const CLAHE_GRID_SIZE: u32 = 8;
pub const CLAHE_CLIP_LIMIT: f64 = 2.0;

/// Runs CLAHE over a fixed tile grid.
pub struct GridManager {
    /// The width of the grid in tiles.
    grid_width: u32,
    /// The height of the grid in tiles.
    grid_height: u32,
    /// Clip limit relative to the uniform bin height.
    clip_limit: f64,
}

impl Default for GridManager {
    fn default() -> Self {
        Self::new(CLAHE_GRID_SIZE, CLAHE_GRID_SIZE, CLAHE_CLIP_LIMIT)
    }
}

impl GridManager {
    pub fn new(grid_width: u32, grid_height: u32, clip_limit: f64) -> Self {
        Self {
            grid_width: grid_width.max(1),
            grid_height: grid_height.max(1),
            clip_limit,
        }
    }

    /// Equalizes a single-channel image and returns the result.
    pub fn equalize(&self, channel: &GrayImage) -> GrayImage {
        let (width, height) = channel.dimensions();
        if width == 0 || height == 0 {
            return channel.clone();
        }

        let chunk_width = width.div_ceil(self.grid_width);
        let chunk_height = height.div_ceil(self.grid_height);

        // --- 1. Per-tile lookup tables ---
        let mut tables: Vec<Lut> = Vec::with_capacity((self.grid_width * self.grid_height) as usize);
        for chunk_y in 0..self.grid_height {
            for chunk_x in 0..self.grid_width {
                let start_x = (chunk_x * chunk_width) as i64;
                let start_y = (chunk_y * chunk_height) as i64;
                let samples = (0..chunk_height as i64).flat_map(|dy| {
                    (0..chunk_width as i64).map(move |dx| {
                        let x = reflect_101(start_x + dx, width);
                        let y = reflect_101(start_y + dy, height);
                        channel.get_pixel(x, y).0[0]
                    })
                });
                let chunk = Chunk::new(chunk_width, chunk_height, samples);
                tables.push(chunk.lookup_table(self.clip_limit));
            }
        }

        // --- 2. Bilinear blending between neighbouring tables ---
        let inverse_width = 1.0 / chunk_width as f64;
        let inverse_height = 1.0 / chunk_height as f64;
        let last_x = self.grid_width as i64 - 1;
        let last_y = self.grid_height as i64 - 1;

        let mut equalized = GrayImage::new(width, height);
        for y in 0..height {
            let (top, bottom, y_weight) = neighbours(y as f64 * inverse_height - 0.5, last_y);
            for x in 0..width {
                let (left, right, x_weight) = neighbours(x as f64 * inverse_width - 0.5, last_x);
                let sample = channel.get_pixel(x, y).0[0] as usize;
                let table = |tx: usize, ty: usize| tables[ty * self.grid_width as usize + tx][sample] as f64;

                let upper = table(left, top) * (1.0 - x_weight) + table(right, top) * x_weight;
                let lower = table(left, bottom) * (1.0 - x_weight) + table(right, bottom) * x_weight;
                let value = upper * (1.0 - y_weight) + lower * y_weight;
                equalized.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
            }
        }
        equalized
    }

    /// Replaces the value channel of an HSV buffer with its equalized version.
    pub fn equalize_value_channel(&self, hsv: &mut HsvImage) {
        let value = GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| Luma([hsv.get_pixel(x, y).0[2]]));
        let equalized = self.equalize(&value);
        for (pixel, enhanced) in hsv.pixels_mut().zip(equalized.pixels()) {
            pixel.0[2] = enhanced.0[0];
        }
    }
}

/// Tile indices on either side of a fractional tile coordinate and the weight of the
/// far one, clamped at the grid edges.
fn neighbours(position: f64, last: i64) -> (usize, usize, f64) {
    let first = position.floor();
    let weight = position - first;
    let near = (first as i64).max(0);
    let far = (first as i64 + 1).min(last);
    (near as usize, far as usize, weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_channel_stays_constant() {
        let channel = GrayImage::from_pixel(224, 224, Luma([120]));
        let equalized = GridManager::default().equalize(&channel);
        let first = equalized.get_pixel(0, 0).0[0];
        assert!(equalized.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn low_contrast_checkerboard_is_stretched() {
        let channel = GrayImage::from_fn(224, 224, |x, y| Luma([if (x + y) % 2 == 0 { 100 } else { 110 }]));
        let equalized = GridManager::default().equalize(&channel);
        // Every tile sees the same histogram, so every pixel uses the same table.
        assert_eq!(equalized.get_pixel(50, 50).0[0], 101);
        assert_eq!(equalized.get_pixel(51, 50).0[0], 113);
    }

    #[test]
    fn uneven_sizes_are_handled() {
        let channel = GrayImage::from_fn(37, 19, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
        let equalized = GridManager::default().equalize(&channel);
        assert_eq!(equalized.dimensions(), (37, 19));
    }

    #[test]
    fn only_the_value_channel_changes() {
        let mut hsv = HsvImage::from_fn(64, 64, |x, y| image::Rgb([10, 200, ((x + y) % 256) as u8]));
        GridManager::default().equalize_value_channel(&mut hsv);
        assert!(hsv.pixels().all(|p| p.0[0] == 10 && p.0[1] == 200));
    }
}
