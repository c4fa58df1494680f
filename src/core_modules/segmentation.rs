// THEORY:
// Colour segmentation separates the fruit from its surroundings. The rules are fixed
// empirical HSV boxes: everything that looks like foliage or soil is background, and
// of what remains only reasonably saturated, reasonably bright pixels are candidates.
//
// Stages:
// 1.  **Thresholding** produces a raw binary mask from the three HSV boxes.
// 2.  **Morphological cleanup** (closing twice, then opening once, 7x7 square) fills
//     pinholes inside the fruit and removes speckle outside it.
// 3.  **Dominant blob** keeps the largest 8-connected component.
// 4.  **Fallback**: when nothing survives, the whole frame is foreground. This is a
//     heuristic kept exactly as-is; it is a tuning candidate, not a correctness rule.
// 5.  **Mask-aware crop** cuts image and mask to the padded bounding box of the blob.

use crate::core_modules::blob_detector::blob_detector;
use crate::core_modules::color_space::color_space::{Hsv, HsvImage, HsvRange};
use crate::core_modules::region::{BoundingBox, ForegroundRegion};
use image::{GenericImageView, GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use tracing::debug;

pub const MASK_ON: u8 = 255;
pub const MASK_OFF: u8 = 0;

/// Foliage, including the cyan cast gray-world balancing gives green backdrops.
pub const BACKGROUND_GREEN: HsvRange = HsvRange::new((30, 25, 25), (100, 255, 255));
/// Dark, moderately saturated soil and wood tones.
pub const BACKGROUND_BROWN: HsvRange = HsvRange::new((5, 40, 20), (25, 200, 140));
/// Anything saturated and bright enough to be fruit.
pub const CANDIDATE_FOREGROUND: HsvRange = HsvRange::new((0, 60, 50), (179, 255, 255));

/// L-infinity radius of the 7x7 structuring element.
pub const STRUCTURING_RADIUS: u8 = 3;
pub const CLOSING_ITERATIONS: usize = 2;
pub const OPENING_ITERATIONS: usize = 1;

/// Fraction of the box size added on every side of the crop.
pub const CROP_PADDING: f64 = 0.05;

/// Where the final mask came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskOrigin {
    /// A real foreground blob survived cleanup.
    Segmented,
    /// Nothing survived; the whole image is treated as foreground.
    Fallback,
}

/// The cleaned mask plus the blob it was built from.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub mask: GrayImage,
    pub origin: MaskOrigin,
    pub region: Option<ForegroundRegion>,
}

/// Raw mask: candidate and not background.
pub fn threshold_foreground(hsv: &HsvImage) -> GrayImage {
    let mut mask = GrayImage::new(hsv.width(), hsv.height());
    for (source, target) in hsv.pixels().zip(mask.pixels_mut()) {
        let Rgb([hue, saturation, value]) = *source;
        let sample = Hsv { hue, saturation, value };
        let background = sample.within(&BACKGROUND_GREEN) || sample.within(&BACKGROUND_BROWN);
        let candidate = sample.within(&CANDIDATE_FOREGROUND);
        *target = Luma([if candidate && !background { MASK_ON } else { MASK_OFF }]);
    }
    mask
}

/// Closing then opening with the square structuring element.
pub fn clean_mask(mask: &GrayImage) -> GrayImage {
    let mut cleaned = mask.clone();
    for _ in 0..CLOSING_ITERATIONS {
        cleaned = dilate(&cleaned, Norm::LInf, STRUCTURING_RADIUS);
    }
    for _ in 0..CLOSING_ITERATIONS {
        cleaned = erode(&cleaned, Norm::LInf, STRUCTURING_RADIUS);
    }
    for _ in 0..OPENING_ITERATIONS {
        cleaned = erode(&cleaned, Norm::LInf, STRUCTURING_RADIUS);
    }
    for _ in 0..OPENING_ITERATIONS {
        cleaned = dilate(&cleaned, Norm::LInf, STRUCTURING_RADIUS);
    }
    cleaned
}

/// Full segmentation of an HSV image into a single-blob mask.
pub fn segment(hsv: &HsvImage) -> Segmentation {
    let cleaned = clean_mask(&threshold_foreground(hsv));

    match blob_detector::largest_blob(&cleaned) {
        Some(region) => {
            let mut mask = GrayImage::new(hsv.width(), hsv.height());
            for point in &region.pixels {
                mask.put_pixel(point.x, point.y, Luma([MASK_ON]));
            }
            Segmentation {
                mask,
                origin: MaskOrigin::Segmented,
                region: Some(region),
            }
        }
        None => {
            debug!(
                width = hsv.width(),
                height = hsv.height(),
                "segmentation found no foreground, treating the whole image as fruit"
            );
            Segmentation {
                mask: GrayImage::from_pixel(hsv.width(), hsv.height(), Luma([MASK_ON])),
                origin: MaskOrigin::Fallback,
                region: None,
            }
        }
    }
}

/// Crops `image` and the mask to the padded blob box. A fallback mask leaves both
/// untouched.
pub fn crop_to_foreground(image: &RgbImage, segmentation: &Segmentation) -> (RgbImage, GrayImage, BoundingBox) {
    let (width, height) = image.dimensions();
    let Some(region) = &segmentation.region else {
        return (image.clone(), segmentation.mask.clone(), BoundingBox::full(width, height));
    };

    let crop = region.bounding_box.expanded(CROP_PADDING, width, height);
    let cropped_image = image
        .view(crop.min.x, crop.min.y, crop.width(), crop.height())
        .to_image();
    let cropped_mask = segmentation
        .mask
        .view(crop.min.x, crop.min.y, crop.width(), crop.height())
        .to_image();
    (cropped_image, cropped_mask, crop)
}
