//! Stagnation detection: RMS similarity between consecutive captures.
//!
//! Pure and deterministic. The engine owns the consecutive-unchanged
//! counter; this module only answers "are these two frames materially the
//! same picture".

use image::imageops::{self, FilterType};
use image::GrayImage;

use crate::perception::Frame;

/// Thumbnail edge used for comparison. Downscaling both frames to the same
/// small size makes the metric cheap and resolution-independent.
const THUMB_SIZE: u32 = 256;

/// Similarity at or above this counts as "materially unchanged".
pub const SIMILARITY_THRESHOLD: f64 = 0.98;

fn thumbnail_gray(frame: &Frame) -> GrayImage {
    let scaled = imageops::resize(frame.image(), THUMB_SIZE, THUMB_SIZE, FilterType::Triangle);
    imageops::grayscale(&scaled)
}

/// Normalized similarity in 0.0..=1.0: `1 − rms/255` over greyscale
/// 256×256 thumbnails of both frames.
pub fn similarity(a: &Frame, b: &Frame) -> f64 {
    let ga = thumbnail_gray(a);
    let gb = thumbnail_gray(b);

    let mut sum_sq = 0.0f64;
    for (pa, pb) in ga.pixels().zip(gb.pixels()) {
        let d = pa.0[0] as f64 - pb.0[0] as f64;
        sum_sq += d * d;
    }
    let rms = (sum_sq / (THUMB_SIZE as f64 * THUMB_SIZE as f64)).sqrt();
    1.0 - rms / 255.0
}

/// True when the two frames are close enough to flag stagnation.
pub fn frames_similar(a: &Frame, b: &Frame) -> bool {
    similarity(a, b) >= SIMILARITY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn uniform(level: u8) -> Frame {
        Frame::new(RgbaImage::from_pixel(64, 64, Rgba([level, level, level, 255])))
    }

    #[test]
    fn identical_frames_are_similar() {
        let f = uniform(128);
        assert_eq!(similarity(&f, &f), 1.0);
        assert!(frames_similar(&f, &f));
    }

    #[test]
    fn small_difference_is_still_similar() {
        // RMS of 2/255 ≈ 0.992 similarity, above the 0.98 threshold.
        assert!(frames_similar(&uniform(128), &uniform(130)));
    }

    #[test]
    fn inverted_frame_is_not_similar() {
        assert!(!frames_similar(&uniform(0), &uniform(255)));
        assert!(similarity(&uniform(0), &uniform(255)) < 0.01);
    }

    #[test]
    fn threshold_boundary_behaves() {
        // RMS of 6/255 ≈ 0.976 similarity, just below the threshold.
        assert!(!frames_similar(&uniform(128), &uniform(134)));
    }

    #[test]
    fn differing_resolutions_compare_via_thumbnails() {
        let a = Frame::new(RgbaImage::from_pixel(640, 480, Rgba([200, 200, 200, 255])));
        let b = Frame::new(RgbaImage::from_pixel(1280, 960, Rgba([200, 200, 200, 255])));
        assert!(frames_similar(&a, &b));
    }
}
