// THEORY (colour spaces):
// The `color_space` module holds the per-pixel colour conversions the rest of the
// pipeline is built on. Everything here is single-pixel scope: a conversion never
// reads a neighbour, so whole-image helpers are plain maps over the buffer.
//
// Conventions are the 8-bit ones the model artifacts were fitted against:
// - Hue is stored halved, in [0, 180), so it fits a byte.
// - Saturation and value are stored in [0, 255].
// - Gray is Rec. 601 luma, rounded.
//
// Key principles:
// 1) Single-pixel scope: conversions are pure functions of one sample.
// 2) HSV buffers reuse `RgbImage` storage with channels (H, S, V), aliased as `HsvImage`
//    so signatures say which interpretation a buffer carries.
// 3) Round trips (RGB -> HSV -> RGB) are lossy by at most a few levels; stages that
//    need an exact image keep the RGB original.

pub mod color_space {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    pub type Channel = u8;
    /// An `RgbImage` whose channels hold (hue/2, saturation, value).
    pub type HsvImage = RgbImage;

    /// Exclusive upper bound of the stored hue channel.
    pub const HUE_RANGE: u16 = 180;

    /// A single HSV sample in the 8-bit convention.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Hsv {
        /// Hue in half-degrees, [0, 180).
        pub hue: Channel,
        /// Saturation, [0, 255].
        pub saturation: Channel,
        /// Value (max channel), [0, 255].
        pub value: Channel,
    }

    impl Hsv {
        pub fn from_rgb(red: Channel, green: Channel, blue: Channel) -> Self {
            let (r, g, b) = (red as f32, green as f32, blue as f32);
            let maximum_channel = r.max(g.max(b));
            let minimum_channel = r.min(g.min(b));
            let chroma = maximum_channel - minimum_channel;

            let saturation = if maximum_channel <= 0.0 {
                0.0
            } else {
                255.0 * chroma / maximum_channel
            };

            let hue_degrees = if chroma <= 0.0 {
                0.0
            } else {
                let (base_difference, sector_offset) = if maximum_channel == r {
                    (g - b, 0.0)
                } else if maximum_channel == g {
                    (b - r, 120.0)
                } else {
                    (r - g, 240.0)
                };
                let mut degrees = sector_offset + 60.0 * base_difference / chroma;
                if degrees < 0.0 {
                    degrees += 360.0;
                }
                degrees
            };

            let hue = ((hue_degrees / 2.0).round() as u16) % HUE_RANGE;

            Hsv {
                hue: hue as Channel,
                saturation: saturation.round().clamp(0.0, 255.0) as Channel,
                value: maximum_channel as Channel,
            }
        }

        /// Converts back to RGB with the sector formula.
        pub fn to_rgb(self) -> [Channel; 3] {
            let value = self.value as f32 / 255.0;
            let saturation = self.saturation as f32 / 255.0;

            if self.saturation == 0 {
                return [self.value; 3];
            }

            let sector_position = (self.hue as f32 * 2.0) / 60.0;
            let sector = sector_position.floor();
            let fraction = sector_position - sector;

            let p = value * (1.0 - saturation);
            let q = value * (1.0 - saturation * fraction);
            let t = value * (1.0 - saturation * (1.0 - fraction));

            let (r, g, b) = match sector as u8 % 6 {
                0 => (value, t, p),
                1 => (q, value, p),
                2 => (p, value, t),
                3 => (p, q, value),
                4 => (t, p, value),
                _ => (value, p, q),
            };

            [to_byte(r * 255.0), to_byte(g * 255.0), to_byte(b * 255.0)]
        }

        /// True when every channel lies inside the inclusive `range`.
        pub fn within(&self, range: &HsvRange) -> bool {
            (range.lower.hue..=range.upper.hue).contains(&self.hue)
                && (range.lower.saturation..=range.upper.saturation).contains(&self.saturation)
                && (range.lower.value..=range.upper.value).contains(&self.value)
        }
    }

    /// An inclusive box in HSV space.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HsvRange {
        pub lower: Hsv,
        pub upper: Hsv,
    }

    impl HsvRange {
        pub const fn new(lower: (u8, u8, u8), upper: (u8, u8, u8)) -> Self {
            HsvRange {
                lower: Hsv { hue: lower.0, saturation: lower.1, value: lower.2 },
                upper: Hsv { hue: upper.0, saturation: upper.1, value: upper.2 },
            }
        }
    }

    /// Luma estimate (Rec. 601), rounded to a byte.
    pub fn luminance(red: Channel, green: Channel, blue: Channel) -> Channel {
        to_byte(0.299_f32 * red as f32 + 0.587_f32 * green as f32 + 0.114_f32 * blue as f32)
    }

    pub fn rgb_to_hsv(image: &RgbImage) -> HsvImage {
        let mut hsv = RgbImage::new(image.width(), image.height());
        for (source, target) in image.pixels().zip(hsv.pixels_mut()) {
            let Rgb([r, g, b]) = *source;
            let converted = Hsv::from_rgb(r, g, b);
            *target = Rgb([converted.hue, converted.saturation, converted.value]);
        }
        hsv
    }

    pub fn hsv_to_rgb(image: &HsvImage) -> RgbImage {
        let mut rgb = RgbImage::new(image.width(), image.height());
        for (source, target) in image.pixels().zip(rgb.pixels_mut()) {
            let Rgb([hue, saturation, value]) = *source;
            *target = Rgb(Hsv { hue, saturation, value }.to_rgb());
        }
        rgb
    }

    pub fn to_grayscale(image: &RgbImage) -> GrayImage {
        let mut gray = GrayImage::new(image.width(), image.height());
        for (source, target) in image.pixels().zip(gray.pixels_mut()) {
            let Rgb([r, g, b]) = *source;
            *target = Luma([luminance(r, g, b)]);
        }
        gray
    }

    #[inline]
    fn to_byte(value: f32) -> Channel {
        value.round().clamp(0.0, 255.0) as Channel
    }
}

#[cfg(test)]
mod tests {
    use super::color_space::*;

    #[test]
    fn primary_colors_map_to_expected_hues() {
        assert_eq!(Hsv::from_rgb(255, 0, 0), Hsv { hue: 0, saturation: 255, value: 255 });
        assert_eq!(Hsv::from_rgb(0, 255, 0).hue, 60);
        assert_eq!(Hsv::from_rgb(0, 0, 255).hue, 120);
    }

    #[test]
    fn gray_has_zero_saturation_and_hue() {
        let gray = Hsv::from_rgb(128, 128, 128);
        assert_eq!(gray.hue, 0);
        assert_eq!(gray.saturation, 0);
        assert_eq!(gray.value, 128);
    }

    #[test]
    fn black_is_fully_dark() {
        assert_eq!(Hsv::from_rgb(0, 0, 0), Hsv { hue: 0, saturation: 0, value: 0 });
    }

    #[test]
    fn round_trip_stays_close() {
        for &(r, g, b) in &[(200u8, 30u8, 40u8), (40, 160, 90), (12, 12, 200), (250, 250, 10)] {
            let back = Hsv::from_rgb(r, g, b).to_rgb();
            for (original, restored) in [r, g, b].iter().zip(back.iter()) {
                assert!((*original as i16 - *restored as i16).abs() <= 4, "{:?} -> {:?}", (r, g, b), back);
            }
        }
    }

    #[test]
    fn range_membership_is_inclusive() {
        let range = HsvRange::new((30, 25, 25), (100, 255, 255));
        assert!(Hsv { hue: 30, saturation: 25, value: 25 }.within(&range));
        assert!(Hsv { hue: 100, saturation: 255, value: 255 }.within(&range));
        assert!(!Hsv { hue: 29, saturation: 200, value: 200 }.within(&range));
    }

    #[test]
    fn luminance_uses_rec601_weights() {
        assert_eq!(luminance(255, 255, 255), 255);
        assert_eq!(luminance(0, 0, 0), 0);
        assert_eq!(luminance(255, 0, 0), 76);
    }
}
