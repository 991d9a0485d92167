// Shared helpers for integration tests.
#![allow(dead_code)]

use qrcode::{Color, QrCode};
use redeem_scanner::RasterFrame;

pub const WHITE: u32 = 0x00_FF_FF_FF;
pub const BLACK: u32 = 0x00_00_00_00;

/// Render `text` as a QR symbol: `scale` pixels per module, `quiet` modules
/// of white border on every side.
pub fn render_qr(text: &str, scale: usize, quiet: usize) -> RasterFrame {
    let code = QrCode::new(text.as_bytes()).expect("encodable test payload");
    let modules = code.width();
    let colors = code.to_colors();
    let side = (modules + 2 * quiet) * scale;

    let mut frame = RasterFrame::filled(side, side, WHITE);
    for my in 0..modules {
        for mx in 0..modules {
            if colors[my * modules + mx] != Color::Dark {
                continue;
            }
            let (ox, oy) = ((mx + quiet) * scale, (my + quiet) * scale);
            for y in oy..oy + scale {
                let row = y * side;
                frame.pixels[row + ox..row + ox + scale].fill(BLACK);
            }
        }
    }
    frame
}

/// Place `symbol` at (`x`, `y`) on a larger frame of `background`.
pub fn embed(symbol: &RasterFrame, width: usize, height: usize, x: usize, y: usize, background: u32) -> RasterFrame {
    let mut frame = RasterFrame::filled(width, height, background);
    for sy in 0..symbol.height.min(height.saturating_sub(y)) {
        for sx in 0..symbol.width.min(width.saturating_sub(x)) {
            frame.pixels[(y + sy) * width + x + sx] = symbol.pixels[sy * symbol.width + sx];
        }
    }
    frame
}

/// Darken `frame` by a left-to-right ramp: the left edge keeps `left` of its
/// brightness, the right edge all of it.
pub fn light_ramp(frame: &RasterFrame, left: f32) -> RasterFrame {
    let mut out = frame.clone();
    let span = frame.width.saturating_sub(1).max(1) as f32;
    for y in 0..frame.height {
        for x in 0..frame.width {
            let gain = left + (1.0 - left) * (x as f32 / span);
            let px = frame.pixels[y * frame.width + x];
            let scale = |c: u32| ((c & 0xFF) as f32 * gain) as u32;
            out.pixels[y * frame.width + x] = (scale(px >> 16) << 16) | (scale(px >> 8) << 8) | scale(px);
        }
    }
    out
}

/// Rotate `frame` by `degrees` about its centre (nearest neighbour) onto a
/// white canvas large enough to hold every corner.
pub fn rotate(frame: &RasterFrame, degrees: f32) -> RasterFrame {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let side = ((frame.width.max(frame.height) as f32) * 1.5) as usize;
    let (cx, cy) = (frame.width as f32 / 2.0, frame.height as f32 / 2.0);
    let half = side as f32 / 2.0;

    let mut out = RasterFrame::filled(side, side, WHITE);
    for y in 0..side {
        for x in 0..side {
            let (dx, dy) = (x as f32 - half, y as f32 - half);
            let sx = cos * dx + sin * dy + cx;
            let sy = -sin * dx + cos * dy + cy;
            if sx >= 0.0 && sy >= 0.0 && (sx as usize) < frame.width && (sy as usize) < frame.height {
                out.pixels[y * side + x] = frame.pixels[sy as usize * frame.width + sx as usize];
            }
        }
    }
    out
}
