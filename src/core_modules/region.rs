// THEORY:
// Plain data containers for the spatial side of segmentation. A `ForegroundRegion`
// summarizes one connected group of foreground pixels; a `BoundingBox` is the
// rectangle the crop stage works with. Neither type knows how it was produced.

/// A pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// An inclusive pixel rectangle, `min` and `max` both inside the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// The box covering a whole `width x height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            min: Point { x: 0, y: 0 },
            max: Point {
                x: width.saturating_sub(1),
                y: height.saturating_sub(1),
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.max.x - self.min.x + 1
    }

    pub fn height(&self) -> u32 {
        self.max.y - self.min.y + 1
    }

    /// Grows the box by a fraction of its own size on every side, clamped to the image.
    /// Padding is truncated to whole pixels.
    pub fn expanded(&self, fraction: f64, image_width: u32, image_height: u32) -> Self {
        let pad_x = (self.width() as f64 * fraction) as u32;
        let pad_y = (self.height() as f64 * fraction) as u32;
        Self {
            min: Point {
                x: self.min.x.saturating_sub(pad_x),
                y: self.min.y.saturating_sub(pad_y),
            },
            max: Point {
                x: (self.max.x + pad_x).min(image_width.saturating_sub(1)),
                y: (self.max.y + pad_y).min(image_height.saturating_sub(1)),
            },
        }
    }
}

/// One 8-connected group of foreground pixels.
#[derive(Debug, Clone)]
pub struct ForegroundRegion {
    /// Every pixel that belongs to the region.
    pub pixels: Vec<Point>,
    /// The rectangle enclosing all pixels of the region.
    pub bounding_box: BoundingBox,
}

impl ForegroundRegion {
    pub fn size(&self) -> usize {
        self.pixels.len()
    }
}
