// Window + software drawing utilities.
// Visual effects provided here:
// 1) A window that shows the live camera image, paced to the target fps.
// 2) A guide frame in the middle of the picture where the code should go.
// 3) A tiny 5x7 bitmap font to render the status HUD on top of the video.

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use redeem_scanner::RasterFrame;
use redeem_scanner::error::AppError;

pub struct Drawer {
    window: Window, // the on-screen window you see
}

impl Drawer {
    /// Create a window and pace its updates to `fps`.
    /// Visual: a new empty window appears with your chosen title.
    pub fn new(title: &str, width: usize, height: usize, fps: usize) -> Result<Self, AppError> {
        let mut window = Window::new(title, width, height, WindowOptions::default())
            .map_err(|e| AppError::Window(e.to_string()))?;
        window.set_target_fps(fps);
        Ok(Self { window })
    }

    /// Push the pixels for this frame to the screen. Blocks until the next refresh slot.
    pub fn present(&mut self, framebuffer: &RasterFrame) -> Result<(), AppError> {
        self.window
            .update_with_buffer(&framebuffer.pixels, framebuffer.width, framebuffer.height)
            .map_err(|e| AppError::Window(e.to_string()))?;
        Ok(())
    }

    /// Returns false when the user closes the window (so we can stop the loop).
    pub fn is_open(&self) -> bool {
        self.window.is_open()
    }

    pub fn esc_pressed(&self) -> bool {
        self.window.is_key_down(Key::Escape)
    }

    fn pressed_once(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    // Enter: open the camera (camera access needs a user gesture).
    pub fn start_pressed(&self) -> bool {
        self.pressed_once(Key::Enter)
    }

    // Space: pause / resume scanning.
    pub fn pause_pressed(&self) -> bool {
        self.pressed_once(Key::Space)
    }

    // R: full reset back to idle.
    pub fn reset_pressed(&self) -> bool {
        self.pressed_once(Key::R)
    }

    // N: scan the next code after a verdict.
    pub fn rescan_pressed(&self) -> bool {
        self.pressed_once(Key::N)
    }

    // S: manual single-shot decode.
    pub fn snapshot_pressed(&self) -> bool {
        self.pressed_once(Key::S)
    }
}

/* ---------- Software drawing: pixels, lines, boxes ---------- */

/// Put a pixel on the framebuffer if (x,y) is inside bounds.
#[inline]
fn put_pixel(fb: &mut RasterFrame, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= fb.width || y >= fb.height {
        return;
    }
    let idx = y * fb.width + x;
    fb.pixels[idx] = color;
}

/// Draw a thin line between (x0,y0) and (x1,y1) using Bresenham.
fn draw_line(fb: &mut RasterFrame, x0: i32, y0: i32, x1: i32, y1: i32, color: u32) {
    let (mut x0, mut y0) = (x0, y0);
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put_pixel(fb, x0, y0, color);
        if x0 == x1 && y0 == y1 { break; }
        let e2 = 2 * err;
        if e2 >= dy { err += dy; x0 += sx; }
        if e2 <= dx { err += dx; y0 += sy; }
    }
}

/// Corner brackets marking the scan area, `inset` pixels from every edge.
/// Visual: four white "L" shapes framing the middle of the picture.
pub fn draw_guide(fb: &mut RasterFrame, inset: i32, arm: i32, color: u32) {
    let (w, h) = (fb.width as i32, fb.height as i32);
    let (l, t, r, b) = (inset, inset, w - 1 - inset, h - 1 - inset);
    if r <= l || b <= t {
        return;
    }
    for thick in 0..2 {
        // top-left
        draw_line(fb, l, t + thick, l + arm, t + thick, color);
        draw_line(fb, l + thick, t, l + thick, t + arm, color);
        // top-right
        draw_line(fb, r - arm, t + thick, r, t + thick, color);
        draw_line(fb, r - thick, t, r - thick, t + arm, color);
        // bottom-left
        draw_line(fb, l, b - thick, l + arm, b - thick, color);
        draw_line(fb, l + thick, b - arm, l + thick, b, color);
        // bottom-right
        draw_line(fb, r - arm, b - thick, r, b - thick, color);
        draw_line(fb, r - thick, b - arm, r - thick, b, color);
    }
}

/// Darken a rectangle to half brightness so HUD text stays readable.
pub fn shade_rect(fb: &mut RasterFrame, x: usize, y: usize, w: usize, h: usize) {
    for yy in y..(y + h).min(fb.height) {
        for xx in x..(x + w).min(fb.width) {
            let idx = yy * fb.width + xx;
            fb.pixels[idx] = (fb.pixels[idx] >> 1) & 0x00_7F_7F_7F;
        }
    }
}

/// Nearest-neighbour copy of `src` into all of `dst`.
/// Visual: the camera picture fills the window whatever the stream resolution.
pub fn blit_scaled(src: &RasterFrame, dst: &mut RasterFrame) {
    if src.is_empty() || dst.is_empty() {
        return;
    }
    for y in 0..dst.height {
        let sy = y * src.height / dst.height;
        let src_row = sy * src.width;
        let dst_row = y * dst.width;
        for x in 0..dst.width {
            let sx = x * src.width / dst.width;
            dst.pixels[dst_row + x] = src.pixels[src_row + sx];
        }
    }
}

/* ---------- 5x7 bitmap font ---------- */

/// Return a 5x7 glyph bitmap. Each u8 is a row; the low 5 bits are the
/// pixels (bit 4 = leftmost). Lowercase is drawn as uppercase; anything
/// without a glyph is drawn as '?'.
fn glyph5x7(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        // Digits 0..9
        '0' => [0b01110,0b10001,0b10011,0b10101,0b11001,0b10001,0b01110],
        '1' => [0b00100,0b01100,0b00100,0b00100,0b00100,0b00100,0b01110],
        '2' => [0b01110,0b10001,0b00001,0b00010,0b00100,0b01000,0b11111],
        '3' => [0b11110,0b00001,0b00001,0b01110,0b00001,0b00001,0b11110],
        '4' => [0b00010,0b00110,0b01010,0b10010,0b11111,0b00010,0b00010],
        '5' => [0b11111,0b10000,0b11110,0b00001,0b00001,0b10001,0b01110],
        '6' => [0b00110,0b01000,0b10000,0b11110,0b10001,0b10001,0b01110],
        '7' => [0b11111,0b00001,0b00010,0b00100,0b01000,0b01000,0b01000],
        '8' => [0b01110,0b10001,0b10001,0b01110,0b10001,0b10001,0b01110],
        '9' => [0b01110,0b10001,0b10001,0b01111,0b00001,0b00010,0b01100],

        'A' => [0b01110,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001],
        'B' => [0b11110,0b10001,0b10001,0b11110,0b10001,0b10001,0b11110],
        'C' => [0b01110,0b10001,0b10000,0b10000,0b10000,0b10001,0b01110],
        'D' => [0b11100,0b10010,0b10001,0b10001,0b10001,0b10010,0b11100],
        'E' => [0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b11111],
        'F' => [0b11111,0b10000,0b10000,0b11110,0b10000,0b10000,0b10000],
        'G' => [0b01110,0b10001,0b10000,0b10111,0b10001,0b10001,0b01111],
        'H' => [0b10001,0b10001,0b10001,0b11111,0b10001,0b10001,0b10001],
        'I' => [0b01110,0b00100,0b00100,0b00100,0b00100,0b00100,0b01110],
        'J' => [0b00111,0b00010,0b00010,0b00010,0b00010,0b10010,0b01100],
        'K' => [0b10001,0b10010,0b10100,0b11000,0b10100,0b10010,0b10001],
        'L' => [0b10000,0b10000,0b10000,0b10000,0b10000,0b10000,0b11111],
        'M' => [0b10001,0b11011,0b10101,0b10101,0b10001,0b10001,0b10001],
        'N' => [0b10001,0b10001,0b11001,0b10101,0b10011,0b10001,0b10001],
        'O' => [0b01110,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110],
        'P' => [0b11110,0b10001,0b10001,0b11110,0b10000,0b10000,0b10000],
        'Q' => [0b01110,0b10001,0b10001,0b10001,0b10101,0b10010,0b01101],
        'R' => [0b11110,0b10001,0b10001,0b11110,0b10100,0b10010,0b10001],
        'S' => [0b01111,0b10000,0b10000,0b01110,0b00001,0b00001,0b11110],
        'T' => [0b11111,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100],
        'U' => [0b10001,0b10001,0b10001,0b10001,0b10001,0b10001,0b01110],
        'V' => [0b10001,0b10001,0b10001,0b10001,0b10001,0b01010,0b00100],
        'W' => [0b10001,0b10001,0b10001,0b10101,0b10101,0b10101,0b01010],
        'X' => [0b10001,0b10001,0b01010,0b00100,0b01010,0b10001,0b10001],
        'Y' => [0b10001,0b10001,0b01010,0b00100,0b00100,0b00100,0b00100],
        'Z' => [0b11111,0b00001,0b00010,0b00100,0b01000,0b10000,0b11111],

        ' ' => [0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b00000],
        '|' => [0b00100,0b00100,0b00100,0b00100,0b00100,0b00100,0b00100],
        ':' => [0b00000,0b00100,0b00000,0b00000,0b00100,0b00000,0b00000],
        '.' => [0b00000,0b00000,0b00000,0b00000,0b00000,0b00100,0b00000],
        ',' => [0b00000,0b00000,0b00000,0b00000,0b00110,0b00100,0b01000],
        '-' => [0b00000,0b00000,0b00000,0b11111,0b00000,0b00000,0b00000],
        '_' => [0b00000,0b00000,0b00000,0b00000,0b00000,0b00000,0b11111],
        '/' => [0b00001,0b00010,0b00010,0b00100,0b01000,0b01000,0b10000],
        '(' => [0b00010,0b00100,0b01000,0b01000,0b01000,0b00100,0b00010],
        ')' => [0b01000,0b00100,0b00010,0b00010,0b00010,0b00100,0b01000],
        '[' => [0b01110,0b01000,0b01000,0b01000,0b01000,0b01000,0b01110],
        ']' => [0b01110,0b00010,0b00010,0b00010,0b00010,0b00010,0b01110],
        '{' => [0b00110,0b00100,0b00100,0b01000,0b00100,0b00100,0b00110],
        '}' => [0b01100,0b00100,0b00100,0b00010,0b00100,0b00100,0b01100],
        '"' => [0b01010,0b01010,0b00000,0b00000,0b00000,0b00000,0b00000],
        '\'' => [0b00100,0b00100,0b00000,0b00000,0b00000,0b00000,0b00000],
        '=' => [0b00000,0b00000,0b11111,0b00000,0b11111,0b00000,0b00000],
        '>' => [0b01000,0b00100,0b00010,0b00001,0b00010,0b00100,0b01000],
        '!' => [0b00100,0b00100,0b00100,0b00100,0b00100,0b00000,0b00100],

        _ => [0b01110,0b10001,0b00001,0b00010,0b00100,0b00000,0b00100], // '?'
    }
}

/// Draw a single 5x7 character at (x,y), with a 1-pixel black shadow for contrast.
fn draw_char_5x7(fb: &mut RasterFrame, x: i32, y: i32, ch: char, color: u32) {
    let rows = glyph5x7(ch);
    for (shadow, c) in [(1, 0x00000000), (0, color)] {
        for (ry, rowbits) in rows.iter().enumerate() {
            for rx in 0..5 {
                if (rowbits & (1 << (4 - rx))) != 0 {
                    put_pixel(fb, x + rx + shadow, y + ry as i32 + shadow, c);
                }
            }
        }
    }
}

pub const GLYPH_ADVANCE: usize = 6; // 5 pixels glyph width + 1 pixel spacing
pub const LINE_HEIGHT: usize = 10;

/// Draw a text string using 5x7 glyphs.
pub fn draw_text_5x7(fb: &mut RasterFrame, mut x: i32, y: i32, text: &str, color: u32) {
    for ch in text.chars() {
        draw_char_5x7(fb, x, y, ch, color);
        x += GLYPH_ADVANCE as i32;
    }
}

/// Cut `text` so it fits in `width` pixels, marking the cut with "..".
pub fn fit_text(text: &str, width: usize) -> String {
    let max = width / GLYPH_ADVANCE;
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("..");
    out
}
