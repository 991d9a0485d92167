// Core types shared by the camera, the decoders and the window.

use std::fmt;

use image::RgbImage;

/// One still frame from the camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterFrame {
    pub width: usize,      // frame width in pixels
    pub height: usize,     // frame height in pixels
    pub pixels: Vec<u32>,  // each entry is 0x00RRGGBB, row-major (what minifb wants)
}

impl RasterFrame {
    /// A frame filled with one colour.
    pub fn filled(width: usize, height: usize, color: u32) -> Self {
        Self { width, height, pixels: vec![color & 0x00FF_FFFF; width * height] }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.len() < self.width * self.height
    }

    /// Pack an `image` RGB buffer into 0x00RRGGBB pixels.
    pub fn from_rgb_image(img: &RgbImage) -> Self {
        let (w, h) = img.dimensions();
        let mut pixels = Vec::with_capacity((w as usize) * (h as usize));
        for pixel in img.pixels() {
            let r = pixel[0] as u32;
            let g = pixel[1] as u32;
            let b = pixel[2] as u32;
            pixels.push((r << 16) | (g << 8) | b);
        }
        Self { width: w as usize, height: h as usize, pixels }
    }

    /// Unpack into an `image` RGB buffer (used for resampling).
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let px = self.pixels[y as usize * self.width + x as usize];
            image::Rgb([((px >> 16) & 0xFF) as u8, ((px >> 8) & 0xFF) as u8, (px & 0xFF) as u8])
        })
    }
}

/// Which physical camera to ask for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Facing {
    /// Back camera ("environment" facing). Preferred for scanning.
    #[default]
    Rear,
    /// Selfie camera ("user" facing).
    Front,
    Any,
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rear" | "back" | "environment" => Ok(Facing::Rear),
            "front" | "user" => Ok(Facing::Front),
            "any" => Ok(Facing::Any),
            other => Err(format!("unknown facing mode '{other}'")),
        }
    }
}

/// The opaque string recovered from a code. Compared by value only.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DecodedPayload(String);

impl DecodedPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DecodedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DecodedPayload {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DecodedPayload {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
