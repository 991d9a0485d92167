// Frame processing for the explicit decode pipeline.
// RasterFrame -> luminance map -> two-level bitmap, plus the bounded
// downscale used by the manual snapshot.

use image::imageops::{self, FilterType};

use crate::types::RasterFrame;

const BLOCK_SIZE_POWER: usize = 3;
const BLOCK_SIZE: usize = 1 << BLOCK_SIZE_POWER; // 8x8 pixel blocks
const MINIMUM_DIMENSION: usize = BLOCK_SIZE * 5;  // below this the 5x5 block window does not fit
const MIN_DYNAMIC_RANGE: u32 = 24;                 // flatter blocks are treated as background

const LUMINANCE_BITS: usize = 5;
const LUMINANCE_SHIFT: usize = 8 - LUMINANCE_BITS;
const LUMINANCE_BUCKETS: usize = 1 << LUMINANCE_BITS;

/// 8-bit luminance per pixel, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LuminanceMap {
    pub width: usize,
    pub height: usize,
    pub luma: Vec<u8>,
}

impl LuminanceMap {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.luma[y * self.width + x]
    }
}

/// Two-level image: `true` is a dark module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    bits: Vec<bool>,
}

impl Bitmap {
    fn blank(width: usize, height: usize) -> Self {
        Self { width, height, bits: vec![false; width * height] }
    }

    #[inline]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.bits[y * self.width + x]
    }

    pub fn dark_count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// Convert 0x00RRGGBB pixels to luminance (ITU-R BT.601, integer weights).
pub fn luminance(frame: &RasterFrame) -> LuminanceMap {
    let len = frame.width * frame.height;
    let luma = frame.pixels[..len]
        .iter()
        .map(|px| {
            let r = (px >> 16) & 0xFF;
            let g = (px >> 8) & 0xFF;
            let b = px & 0xFF;
            ((77 * r + 150 * g + 29 * b) >> 8) as u8
        })
        .collect();
    LuminanceMap { width: frame.width, height: frame.height, luma }
}

/// Hybrid (locally adaptive) binarization.
///
/// Each 8x8 block gets a black point from its own contrast; flat blocks
/// borrow from their already-computed neighbours so a large dark module
/// is not mistaken for background. Every pixel is then thresholded against
/// the mean black point of the surrounding 5x5 blocks, which keeps uneven
/// lighting across the frame from washing out one side of the code.
///
/// Frames too small for the block window fall back to one global threshold.
/// Returns `None` when there is no usable contrast at all.
pub fn binarize(lum: &LuminanceMap) -> Option<Bitmap> {
    if lum.width == 0 || lum.height == 0 {
        return None;
    }
    if lum.width < MINIMUM_DIMENSION || lum.height < MINIMUM_DIMENSION {
        return binarize_global(lum);
    }

    let sub_width = lum.width.div_ceil(BLOCK_SIZE);
    let sub_height = lum.height.div_ceil(BLOCK_SIZE);
    let black_points = block_black_points(lum, sub_width, sub_height);
    Some(threshold_blocks(lum, sub_width, sub_height, &black_points))
}

fn block_black_points(lum: &LuminanceMap, sub_width: usize, sub_height: usize) -> Vec<u32> {
    let max_y_offset = lum.height - BLOCK_SIZE;
    let max_x_offset = lum.width - BLOCK_SIZE;
    let mut points = vec![0u32; sub_width * sub_height];

    for y in 0..sub_height {
        let y_offset = (y << BLOCK_SIZE_POWER).min(max_y_offset);
        for x in 0..sub_width {
            let x_offset = (x << BLOCK_SIZE_POWER).min(max_x_offset);

            let (mut sum, mut min, mut max) = (0u32, 0xFFu32, 0u32);
            for yy in 0..BLOCK_SIZE {
                let row = (y_offset + yy) * lum.width + x_offset;
                for &p in &lum.luma[row..row + BLOCK_SIZE] {
                    let p = p as u32;
                    sum += p;
                    min = min.min(p);
                    max = max.max(p);
                }
            }

            let mut average = sum >> (BLOCK_SIZE_POWER * 2);
            if max - min <= MIN_DYNAMIC_RANGE {
                // Low contrast: assume light background unless the neighbours
                // say this block sits inside something dark.
                average = min / 2;
                if y > 0 && x > 0 {
                    let up = points[(y - 1) * sub_width + x];
                    let left = points[y * sub_width + x - 1];
                    let diag = points[(y - 1) * sub_width + x - 1];
                    let neighbour = (up + 2 * left + diag) / 4;
                    if min < neighbour {
                        average = neighbour;
                    }
                }
            }
            points[y * sub_width + x] = average;
        }
    }
    points
}

fn threshold_blocks(lum: &LuminanceMap, sub_width: usize, sub_height: usize, points: &[u32]) -> Bitmap {
    let max_y_offset = lum.height - BLOCK_SIZE;
    let max_x_offset = lum.width - BLOCK_SIZE;
    let mut bitmap = Bitmap::blank(lum.width, lum.height);

    // Clamp so the 5x5 window stays inside the block grid.
    let cap = |v: usize, max: usize| v.max(2).min(max);

    for y in 0..sub_height {
        let y_offset = (y << BLOCK_SIZE_POWER).min(max_y_offset);
        let top = cap(y, sub_height - 3);
        for x in 0..sub_width {
            let x_offset = (x << BLOCK_SIZE_POWER).min(max_x_offset);
            let left = cap(x, sub_width - 3);

            let mut sum = 0u32;
            for row in top - 2..=top + 2 {
                let base = row * sub_width;
                sum += points[base + left - 2..=base + left + 2].iter().sum::<u32>();
            }
            let threshold = sum / 25;

            for yy in 0..BLOCK_SIZE {
                let py = y_offset + yy;
                for xx in 0..BLOCK_SIZE {
                    let px = x_offset + xx;
                    if lum.get(px, py) as u32 <= threshold {
                        bitmap.bits[py * lum.width + px] = true;
                    }
                }
            }
        }
    }
    bitmap
}

/// One threshold for the whole frame, placed in the valley between the two
/// dominant luminance peaks.
pub fn binarize_global(lum: &LuminanceMap) -> Option<Bitmap> {
    let black_point = estimate_black_point(&lum.luma)?;
    let mut bitmap = Bitmap::blank(lum.width, lum.height);
    for (bit, &p) in bitmap.bits.iter_mut().zip(&lum.luma) {
        *bit = (p as u32) < black_point;
    }
    Some(bitmap)
}

fn estimate_black_point(luma: &[u8]) -> Option<u32> {
    let mut buckets = [0u32; LUMINANCE_BUCKETS];
    for &p in luma {
        buckets[(p as usize) >> LUMINANCE_SHIFT] += 1;
    }

    let (first_peak, max_count) = buckets
        .iter()
        .enumerate()
        .max_by_key(|(_, c)| **c)
        .map(|(i, c)| (i, *c))?;

    // Second peak: tall, and far from the first.
    let mut second_peak = 0usize;
    let mut second_score = 0u64;
    for (x, &count) in buckets.iter().enumerate() {
        let distance = x.abs_diff(first_peak) as u64;
        let score = count as u64 * distance * distance;
        if score > second_score {
            second_peak = x;
            second_score = score;
        }
    }

    if second_score == 0 {
        return None;
    }

    let (lo, hi) = if first_peak <= second_peak { (first_peak, second_peak) } else { (second_peak, first_peak) };
    if hi - lo <= LUMINANCE_BUCKETS / 16 {
        return None;
    }

    let mut best_valley = hi - 1;
    let mut best_score: i64 = -1;
    for x in (lo + 1..hi).rev() {
        let from_first = (x - lo) as i64;
        let score = from_first * from_first * (hi - x) as i64 * (max_count - buckets[x]) as i64;
        if score > best_score {
            best_valley = x;
            best_score = score;
        }
    }

    Some((best_valley << LUMINANCE_SHIFT) as u32)
}

/// Shrink so the longest side is at most `max_dim`. Smaller frames are copied as-is.
pub fn downscale(frame: &RasterFrame, max_dim: usize) -> RasterFrame {
    let longest = frame.width.max(frame.height);
    if frame.is_empty() || max_dim == 0 || longest <= max_dim {
        return frame.clone();
    }

    let scale = max_dim as f64 / longest as f64;
    let w = ((frame.width as f64 * scale).round() as u32).max(1);
    let h = ((frame.height as f64 * scale).round() as u32).max(1);
    let resized = imageops::resize(&frame.to_rgb_image(), w, h, FilterType::Triangle);
    RasterFrame::from_rgb_image(&resized)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Left half dark, right half light, with a brightness ramp top to bottom.
    fn split_frame(w: usize, h: usize) -> RasterFrame {
        let mut frame = RasterFrame::filled(w, h, 0);
        for y in 0..h {
            let lift = (y * 60 / h) as u32;
            for x in 0..w {
                let v = if x < w / 2 { 20 + lift } else { 180 + lift };
                frame.pixels[y * w + x] = (v << 16) | (v << 8) | v;
            }
        }
        frame
    }

    #[test]
    fn luminance_weights_green_heaviest() {
        let mut frame = RasterFrame::filled(3, 1, 0);
        frame.pixels = vec![0x00_FF_00_00, 0x00_00_FF_00, 0x00_00_00_FF];
        let lum = luminance(&frame);
        assert!(lum.luma[1] > lum.luma[0] && lum.luma[0] > lum.luma[2]);
        assert_eq!(luminance(&RasterFrame::filled(1, 1, 0x00_FF_FF_FF)).luma[0], 255);
    }

    /// 4px dark/light stripes under a left-to-right lighting ramp. The dark
    /// stripes on the bright side are as light as the light stripes on the dim side.
    fn striped_ramp(w: usize, h: usize) -> RasterFrame {
        let mut frame = RasterFrame::filled(w, h, 0);
        for y in 0..h {
            for x in 0..w {
                let illum = 40 + (x * 100 / w) as u32;
                let v = if (x / 4) % 2 == 0 { illum - 20 } else { illum + 80 };
                frame.pixels[y * w + x] = (v << 16) | (v << 8) | v;
            }
        }
        frame
    }

    #[test]
    fn hybrid_follows_uneven_lighting() {
        let lum = luminance(&striped_ramp(128, 64));
        let bits = binarize(&lum).unwrap();
        for y in [0, 30, 63] {
            for x in 0..128 {
                assert_eq!(bits.is_dark(x, y), (x / 4) % 2 == 0, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn flat_white_frame_has_no_dark_pixels() {
        let lum = luminance(&RasterFrame::filled(64, 64, 0x00_F0_F0_F0));
        let bits = binarize(&lum).unwrap();
        assert_eq!(bits.dark_count(), 0);
    }

    #[test]
    fn small_frames_use_global_threshold() {
        let lum = luminance(&split_frame(20, 10));
        let bits = binarize(&lum).unwrap();
        assert!(bits.is_dark(1, 1));
        assert!(!bits.is_dark(18, 1));
    }

    #[test]
    fn global_threshold_needs_two_peaks() {
        let lum = luminance(&RasterFrame::filled(10, 10, 0x00_80_80_80));
        assert!(binarize_global(&lum).is_none());
    }

    #[test]
    fn empty_map_does_not_binarize() {
        let lum = LuminanceMap { width: 0, height: 0, luma: vec![] };
        assert!(binarize(&lum).is_none());
    }

    #[test]
    fn downscale_bounds_longest_side() {
        let frame = RasterFrame::filled(1280, 720, 0x00_33_66_99);
        let small = downscale(&frame, 640);
        assert_eq!((small.width, small.height), (640, 360));
        assert_eq!(small.pixels[0], 0x00_33_66_99);

        let tiny = RasterFrame::filled(100, 50, 0);
        assert_eq!(downscale(&tiny, 640), tiny);
    }
}
