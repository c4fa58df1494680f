// THEORY:
// The `BlobDetector` is the connected-component stage of segmentation. It groups the
// foreground pixels of a binary mask into spatially coherent blobs and lets the
// preprocessor keep only the dominant one.
//
// Key architectural principles & algorithm steps:
// 1.  **Seeding**: The mask is scanned in row-major order. Every foreground pixel that
//     has not been visited yet seeds a new blob, so blob order is deterministic.
// 2.  **Region Growing**: From each seed the blob expands over all 8 neighbours that are
//     foreground and unvisited, using an explicit stack instead of recursion so large
//     fruit cannot overflow the call stack.
// 3.  **Data Aggregation**: Once a blob is fully grown, its bounding box is computed and
//     packaged into a `ForegroundRegion`.
// 4.  **Stateless Utility**: `find_blobs` and `largest_blob` only look at the mask they
//     are given.

use crate::core_modules::region::{BoundingBox, ForegroundRegion, Point};
use image::GrayImage;

pub mod blob_detector {
    use super::*;

    /// Samples at or above this value count as foreground.
    const FOREGROUND_THRESHOLD: u8 = 128;

    /// Finds every 8-connected foreground blob in `mask`.
    pub fn find_blobs(mask: &GrayImage) -> Vec<ForegroundRegion> {
        let (width, height) = mask.dimensions();
        let mut visited = vec![false; (width as usize) * (height as usize)];
        let mut blobs = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = (y * width + x) as usize;
                if visited[index] || mask.get_pixel(x, y).0[0] < FOREGROUND_THRESHOLD {
                    continue;
                }
                blobs.push(grow_blob_from_seed(Point { x, y }, mask, &mut visited));
            }
        }

        blobs
    }

    /// The blob with the most pixels. Ties keep the blob found first.
    pub fn largest_blob(mask: &GrayImage) -> Option<ForegroundRegion> {
        find_blobs(mask)
            .into_iter()
            .fold(None, |best: Option<ForegroundRegion>, blob| match best {
                Some(current) if current.size() >= blob.size() => Some(current),
                _ => Some(blob),
            })
    }

    /// Depth-first flood fill over the 8-neighbourhood.
    fn grow_blob_from_seed(seed: Point, mask: &GrayImage, visited: &mut [bool]) -> ForegroundRegion {
        let (width, height) = mask.dimensions();
        let mut pixels: Vec<Point> = Vec::new();
        let mut stack: Vec<Point> = vec![seed];
        visited[(seed.y * width + seed.x) as usize] = true;

        let mut min_x = seed.x;
        let mut min_y = seed.y;
        let mut max_x = seed.x;
        let mut max_y = seed.y;

        while let Some(current) = stack.pop() {
            pixels.push(current);
            min_x = min_x.min(current.x);
            min_y = min_y.min(current.y);
            max_x = max_x.max(current.x);
            max_y = max_y.max(current.y);

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = current.x as i64 + dx;
                    let ny = current.y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }

                    let (nx, ny) = (nx as u32, ny as u32);
                    let index = (ny * width + nx) as usize;
                    if !visited[index] && mask.get_pixel(nx, ny).0[0] >= FOREGROUND_THRESHOLD {
                        visited[index] = true;
                        stack.push(Point { x: nx, y: ny });
                    }
                }
            }
        }

        ForegroundRegion {
            pixels,
            bounding_box: BoundingBox {
                min: Point { x: min_x, y: min_y },
                max: Point { x: max_x, y: max_y },
            },
        }
    }
}
