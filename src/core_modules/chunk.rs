// THEORY:
// The `Chunk` module represents one rectangular tile of a single-channel image. It is
// the unit of regional analysis for localized histogram equalization: every tile
// learns its own intensity distribution and turns it into a lookup table, so contrast
// is stretched according to local content instead of the global histogram.
//
// Key architectural principles:
// 1.  **Regional Statistics**: A chunk only knows the samples inside its own rectangle.
//     It builds a 256-bin histogram and nothing else.
// 2.  **Contrast Limiting**: Before the cumulative histogram is taken, bins above the
//     clip limit are cut and the excess is spread evenly over all bins. This caps the
//     slope of the mapping and keeps flat areas from amplifying noise.
// 3.  **Data Container**: A chunk does not know its neighbours. Blending between tiles
//     is the job of the `GridManager`.

pub mod chunk {
    pub const HISTOGRAM_BINS: usize = 256;

    pub type Histogram = [u32; HISTOGRAM_BINS];
    pub type Lut = [u8; HISTOGRAM_BINS];

    /// A rectangular tile of samples together with its histogram.
    pub struct Chunk {
        /// The width of the tile in pixels.
        pub width: u32,
        /// The height of the tile in pixels.
        pub height: u32,
        /// Intensity histogram of the tile.
        pub histogram: Histogram,
    }

    impl Chunk {
        pub fn new(width: u32, height: u32, samples: impl IntoIterator<Item = u8>) -> Self {
            let mut histogram = [0u32; HISTOGRAM_BINS];
            for sample in samples {
                histogram[sample as usize] += 1;
            }
            Self { width, height, histogram }
        }

        pub fn area(&self) -> u32 {
            self.width * self.height
        }

        /// Absolute clip height for a relative `clip_limit` (as a multiple of the
        /// uniform bin height). Never below one.
        pub fn absolute_clip_limit(&self, clip_limit: f64) -> u32 {
            ((clip_limit * self.area() as f64 / HISTOGRAM_BINS as f64) as u32).max(1)
        }

        /// Clips the histogram and redistributes the excess: an even batch to every bin,
        /// then the remainder one count at a time at a fixed stride.
        pub fn clipped_histogram(&self, clip_limit: f64) -> Histogram {
            let limit = self.absolute_clip_limit(clip_limit);
            let mut histogram = self.histogram;

            let mut clipped = 0u32;
            for bin in histogram.iter_mut() {
                if *bin > limit {
                    clipped += *bin - limit;
                    *bin = limit;
                }
            }

            let redistribute_batch = clipped / HISTOGRAM_BINS as u32;
            let mut residual = clipped - redistribute_batch * HISTOGRAM_BINS as u32;
            for bin in histogram.iter_mut() {
                *bin += redistribute_batch;
            }

            if residual != 0 {
                let residual_step = (HISTOGRAM_BINS as u32 / residual).max(1) as usize;
                let mut index = 0;
                while index < HISTOGRAM_BINS && residual > 0 {
                    histogram[index] += 1;
                    index += residual_step;
                    residual -= 1;
                }
            }

            histogram
        }

        /// The tile's contrast-limited equalization table.
        pub fn lookup_table(&self, clip_limit: f64) -> Lut {
            let histogram = self.clipped_histogram(clip_limit);
            let scale = 255.0 / self.area().max(1) as f64;

            let mut lut = [0u8; HISTOGRAM_BINS];
            let mut cumulative = 0u32;
            for (entry, count) in lut.iter_mut().zip(histogram.iter()) {
                cumulative += count;
                *entry = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
            }
            lut
        }
    }
}
