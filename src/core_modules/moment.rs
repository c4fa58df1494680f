// THEORY:
// Area moments of a closed polygon, computed from its vertices alone with Green's
// theorem. For a contour traced around a blob this gives the enclosed area (m00) and
// the first-order moments (m10, m01) whose ratios are the centroid, without
// rasterizing the interior. Moments are signed by winding direction; the area is
// reported as an absolute value, and the centroid ratio is sign-independent.

use imageproc::point::Point;

/// Zeroth- and first-order moments of a closed polygon.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolygonMoments {
    /// Signed area.
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl PolygonMoments {
    /// Moments of the polygon through `points`, closed back to the first vertex.
    pub fn from_points(points: &[Point<i32>]) -> Self {
        if points.len() < 3 {
            return Self::default();
        }

        let mut moments = Self::default();
        let mut previous = points[points.len() - 1];
        for &current in points {
            let (x0, y0) = (previous.x as f64, previous.y as f64);
            let (x1, y1) = (current.x as f64, current.y as f64);
            let cross = x0 * y1 - x1 * y0;
            moments.m00 += cross;
            moments.m10 += cross * (x0 + x1);
            moments.m01 += cross * (y0 + y1);
            previous = current;
        }

        moments.m00 /= 2.0;
        moments.m10 /= 6.0;
        moments.m01 /= 6.0;
        moments
    }

    pub fn area(&self) -> f64 {
        self.m00.abs()
    }

    /// The centroid, or `None` for a degenerate (zero-area) polygon.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.m00.abs() < f64::EPSILON {
            return None;
        }
        Some((self.m10 / self.m00, self.m01 / self.m00))
    }
}
