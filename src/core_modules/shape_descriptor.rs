// THEORY:
// Centroid-Contour-Distance (CCD) shape signature. The outer boundary of the fruit is
// traced, its centroid is taken from the polygon's area moments, and the angle space
// around the centroid is split into 32 equal sectors. Each sector stores the furthest
// boundary point that falls into it, and the whole signature is scaled by its own
// maximum so fruit size does not matter, only outline.
//
// Degenerate masks (no contour, zero area, or the whole-frame fallback) yield the
// all-zero signature.

use crate::core_modules::moment::PolygonMoments;
use crate::core_modules::segmentation::MaskOrigin;
use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use std::f64::consts::TAU;
use tracing::debug;

pub const SHAPE_FEATURES: usize = 32;

pub fn centroid_contour_distance(mask: &GrayImage, origin: MaskOrigin) -> [f64; SHAPE_FEATURES] {
    let mut descriptor = [0.0f64; SHAPE_FEATURES];
    if origin == MaskOrigin::Fallback {
        debug!("fallback mask has no fruit outline, shape signature is zero");
        return descriptor;
    }

    // --- 1. Dominant outer contour ---
    let contours: Vec<Contour<i32>> = find_contours(mask);
    let Some((contour, moments)) = contours
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| (contour, PolygonMoments::from_points(&contour.points)))
        .fold(None, |best: Option<(&Contour<i32>, PolygonMoments)>, candidate| match best {
            Some(current) if current.1.area() >= candidate.1.area() => Some(current),
            _ => Some(candidate),
        })
    else {
        debug!("mask has no outer contour, shape signature is zero");
        return descriptor;
    };

    // --- 2. Centroid ---
    let Some((center_x, center_y)) = moments.centroid() else {
        debug!(points = contour.points.len(), "contour encloses no area, shape signature is zero");
        return descriptor;
    };

    // --- 3. Furthest point per angular sector ---
    let sector_width = TAU / SHAPE_FEATURES as f64;
    for point in &contour.points {
        let dx = point.x as f64 - center_x;
        let dy = point.y as f64 - center_y;
        let distance = dx.hypot(dy);
        let angle = dy.atan2(dx).rem_euclid(TAU);
        let sector = ((angle / sector_width) as usize).min(SHAPE_FEATURES - 1);
        descriptor[sector] = descriptor[sector].max(distance);
    }

    // --- 4. Scale invariance ---
    let maximum = descriptor.iter().cloned().fold(0.0f64, f64::max);
    if maximum > 0.0 {
        for value in descriptor.iter_mut() {
            *value /= maximum;
        }
    }
    descriptor
}
