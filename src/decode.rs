//! Decoding engine.
//!
//! Two interchangeable backends behind [`Decode`]:
//! - [`PlatformDetector`]: the QR library's own end-to-end detector, fed a
//!   greyscale view of the frame and otherwise treated as a black box.
//! - [`LibraryPipeline`]: the explicit luminance -> hybrid binarize ->
//!   bitmap structural decode pipeline.
//!
//! Exactly one is chosen per session by [`DecodeEngine::probe`]. A miss is
//! the normal outcome of most frames and is reported as `None`; a panic
//! inside a decoder is contained and reported the same way.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Once;

use rqrr::PreparedImage;
use tracing::{debug, info, warn};

use crate::types::{DecodedPayload, RasterFrame};
use crate::vision;

/// Side of the blank frame used to self-test the platform detector.
const PROBE_FRAME_SIZE: usize = 64;

/// Locate and decode one optical code in a still frame.
pub trait Decode {
    fn try_decode(&self, frame: &RasterFrame) -> Option<DecodedPayload>;

    fn name(&self) -> &'static str;
}

/// Which backend the operator asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetectorPreference {
    /// Platform detector if it probes as available, pipeline otherwise.
    #[default]
    Auto,
    Platform,
    Pipeline,
}

impl FromStr for DetectorPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "platform" | "native" => Ok(Self::Platform),
            "pipeline" | "library" => Ok(Self::Pipeline),
            other => Err(format!("unknown detector '{other}'")),
        }
    }
}

thread_local! {
    static DECODING: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Panics raised inside a decoder go to the debug log, not stderr.
/// Every other panic still reaches the previous hook.
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !DECODING.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

/// Run a decoder, turning a panic into a miss.
fn contained<F>(backend: &'static str, f: F) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    install_quiet_hook();
    DECODING.with(|d| d.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    DECODING.with(|d| d.set(false));

    match result {
        Ok(found) => found.filter(|text| !text.is_empty()),
        Err(payload) => {
            debug!(backend, reason = panic_message(payload.as_ref()), "decoder panicked; treating frame as a miss");
            None
        }
    }
}

/// Variant A: the library's built-in detector.
#[derive(Debug, Clone, Copy)]
pub struct PlatformDetector {
    _probed: (),
}

impl PlatformDetector {
    /// Availability check, run once at startup. Needs the `platform-detector`
    /// feature and a clean run over a blank frame.
    pub fn probe() -> Option<Self> {
        if !cfg!(feature = "platform-detector") {
            debug!("platform detector not compiled in");
            return None;
        }
        let blank = RasterFrame::filled(PROBE_FRAME_SIZE, PROBE_FRAME_SIZE, 0x00_FF_FF_FF);
        let outcome = panic::catch_unwind(|| Self::detect(&blank));
        match outcome {
            Ok(None) => Some(Self { _probed: () }),
            Ok(Some(_)) | Err(_) => {
                warn!("platform detector failed its self-test");
                None
            }
        }
    }

    fn detect(frame: &RasterFrame) -> Option<String> {
        let w = frame.width;
        let mut prepared = PreparedImage::prepare_from_greyscale(frame.width, frame.height, |x, y| {
            let px = frame.pixels[y * w + x];
            let (r, g, b) = ((px >> 16) & 0xFF, (px >> 8) & 0xFF, px & 0xFF);
            ((r * 299 + g * 587 + b * 114) / 1000) as u8
        });
        prepared.detect_grids().iter().find_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                debug!("grid decode failed: {e:?}");
                None
            }
        })
    }
}

impl Decode for PlatformDetector {
    fn try_decode(&self, frame: &RasterFrame) -> Option<DecodedPayload> {
        if frame.is_empty() {
            return None;
        }
        contained(self.name(), || Self::detect(frame)).map(DecodedPayload::from)
    }

    fn name(&self) -> &'static str {
        "platform"
    }
}

/// Variant B: luminance map, hybrid binarizer, structural decode of the bitmap.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryPipeline;

impl LibraryPipeline {
    fn run(frame: &RasterFrame) -> Option<String> {
        let lum = vision::luminance(frame);
        let bits = vision::binarize(&lum)?;
        let mut prepared = PreparedImage::prepare_from_bitmap(bits.width, bits.height, |x, y| bits.is_dark(x, y));
        prepared.detect_grids().iter().find_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                debug!("bitmap grid decode failed: {e:?}");
                None
            }
        })
    }
}

impl Decode for LibraryPipeline {
    fn try_decode(&self, frame: &RasterFrame) -> Option<DecodedPayload> {
        if frame.is_empty() {
            return None;
        }
        contained(self.name(), || Self::run(frame)).map(DecodedPayload::from)
    }

    fn name(&self) -> &'static str {
        "pipeline"
    }
}

/// The backend a session decodes with.
#[derive(Debug, Clone, Copy)]
pub enum DecodeEngine {
    Platform(PlatformDetector),
    Pipeline(LibraryPipeline),
}

impl DecodeEngine {
    /// Pick the backend once, honouring `preference` where possible.
    pub fn probe(preference: DetectorPreference) -> Self {
        let engine = match preference {
            DetectorPreference::Pipeline => DecodeEngine::Pipeline(LibraryPipeline),
            DetectorPreference::Auto | DetectorPreference::Platform => match PlatformDetector::probe() {
                Some(detector) => DecodeEngine::Platform(detector),
                None => {
                    if preference == DetectorPreference::Platform {
                        warn!("platform detector requested but unavailable; using pipeline");
                    }
                    DecodeEngine::Pipeline(LibraryPipeline)
                }
            },
        };
        info!(backend = engine.name(), ?preference, "decoder selected");
        engine
    }
}

impl Decode for DecodeEngine {
    fn try_decode(&self, frame: &RasterFrame) -> Option<DecodedPayload> {
        match self {
            DecodeEngine::Platform(d) => d.try_decode(frame),
            DecodeEngine::Pipeline(p) => p.try_decode(frame),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            DecodeEngine::Platform(d) => d.name(),
            DecodeEngine::Pipeline(p) => p.name(),
        }
    }
}

/// Manual single-shot decode: shrink the frame so its longest side is at
/// most `max_dim`, then decode that copy once.
pub fn snapshot_decode<D: Decode>(decoder: &D, frame: &RasterFrame, max_dim: usize) -> Option<DecodedPayload> {
    let small = vision::downscale(frame, max_dim);
    debug!(width = small.width, height = small.height, "snapshot decode");
    decoder.try_decode(&small)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_parses() {
        assert_eq!("Pipeline".parse::<DetectorPreference>(), Ok(DetectorPreference::Pipeline));
        assert_eq!("native".parse::<DetectorPreference>(), Ok(DetectorPreference::Platform));
        assert!("zxing".parse::<DetectorPreference>().is_err());
    }

    #[test]
    fn pipeline_preference_skips_probing() {
        let engine = DecodeEngine::probe(DetectorPreference::Pipeline);
        assert_eq!(engine.name(), "pipeline");
    }

    #[cfg(feature = "platform-detector")]
    #[test]
    fn auto_prefers_platform_when_available() {
        let engine = DecodeEngine::probe(DetectorPreference::Auto);
        assert_eq!(engine.name(), "platform");
    }

    #[test]
    fn empty_frames_are_misses() {
        let empty = RasterFrame { width: 0, height: 0, pixels: vec![] };
        assert!(LibraryPipeline.try_decode(&empty).is_none());
        if let Some(detector) = PlatformDetector::probe() {
            assert!(detector.try_decode(&empty).is_none());
        }
    }

    #[test]
    fn panicking_decoder_is_a_miss() {
        assert!(contained("test", || panic!("corrupt grid")).is_none());
        assert!(contained("test", || Some(String::new())).is_none());
        assert_eq!(contained("test", || Some("T1".into())).as_deref(), Some("T1"));
    }

    #[test]
    fn decoder_panics_stay_off_stderr_only_while_decoding() {
        assert!(contained("test", || panic!("bad finder pattern")).is_none());
        assert!(!DECODING.with(Cell::get));

        let payload = panic::catch_unwind(|| panic!("outside {}", "decoder")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "outside decoder");
        let payload = panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
