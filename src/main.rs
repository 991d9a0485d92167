// What you SEE:
// • A black window until you press ENTER, then the live camera with a guide frame.
// • Hold a QR code inside the frame: it is decoded and verified once.
// • SPACE pauses/resumes, S decodes a single snapshot, N scans the next code,
//   R resets to idle. ESC quits.

mod draw;

use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;

use draw::{blit_scaled, draw_guide, draw_text_5x7, fit_text, shade_rect, Drawer, LINE_HEIGHT};
use redeem_scanner::error::AppError;
use redeem_scanner::webcam::WebcamOpener;
use redeem_scanner::{
    DecodeEngine, HttpVerifier, RasterFrame, ScanSession, ScanState, ScannerConfig,
    SessionOptions, Verdict,
};

const WHITE: u32 = 0x00_FF_FF_FF;
const GREEN: u32 = 0x00_44_DD_66;
const AMBER: u32 = 0x00_FF_CC_33;
const RED: u32 = 0x00_FF_55_55;

fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ScannerConfig::load()?;
    info!(backend = ?config.backend_url, detector = ?config.detector, "starting scanner");

    /* --- Verification runs on a small tokio runtime; the window loop stays synchronous. */
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let decoder = DecodeEngine::probe(config.detector);
    let verifier = HttpVerifier::new(&config)?;
    let opener = WebcamOpener::new(config.camera_index, config.frame_width, config.frame_height, config.target_fps);
    let options = SessionOptions { facing: config.facing, snapshot_max_dim: config.snapshot_max_dim as usize };
    let mut session = ScanSession::new(opener, verifier, decoder, runtime.handle().clone(), options);

    /* --- Window + reusable screen buffer ---
       Visual: one window, sized to the requested capture resolution. */
    let (w, h) = (config.frame_width as usize, config.frame_height as usize);
    let mut drawer = Drawer::new("Redeem Scanner", w, h, config.target_fps as usize)?;
    let mut screen = RasterFrame::filled(w, h, 0);

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut hud_fps_text = String::from("FPS: 0.0");

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        /* 1) Inputs */
        if drawer.start_pressed() { session.start(); }
        if drawer.pause_pressed() { session.toggle_pause(); }
        if drawer.rescan_pressed() { session.rescan(); }
        if drawer.reset_pressed() { session.reset(); }
        if drawer.snapshot_pressed() { session.snapshot(); }

        /* 2) One decode tick per refresh (also picks up finished verifications). */
        session.tick();

        /* 3) Base image: camera preview, or black when no camera is held. */
        match session.preview() {
            Some(frame) => blit_scaled(frame, &mut screen),
            None => screen.pixels.fill(0),
        }
        if session.camera_open() {
            let inset = (w.min(h) / 6) as i32;
            draw_guide(&mut screen, inset, inset / 2, WHITE);
        }

        /* 4) HUD */
        draw_hud(&mut screen, &session, &hud_fps_text);

        /* 5) Present (blocks until the next refresh slot). */
        drawer.present(&screen)?;

        /* 6) FPS counter */
        frames_this_second += 1;
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let fps = frames_this_second as f32 / now.duration_since(last_fps_time).as_secs_f32();
            hud_fps_text = format!("FPS: {fps:.1}");
            frames_this_second = 0;
            last_fps_time = now;
        }
    }

    session.teardown();
    info!(verifications = session.verifications_issued(), "scanner closed");
    Ok(())
}

fn status_text(state: &ScanState) -> &'static str {
    match state {
        ScanState::Idle => "IDLE",
        ScanState::AcquiringCamera => "PREPARING CAMERA",
        ScanState::Scanning { paused: false } => "SCANNING",
        ScanState::Scanning { paused: true } => "PAUSED",
        ScanState::Verifying => "VERIFYING",
        ScanState::Done(Verdict::Validated(_)) => "VERIFIED",
        ScanState::Done(Verdict::NotFound(_)) => "NOT FOUND",
        ScanState::Errored(_) => "ERROR",
    }
}

fn draw_hud<O, V>(screen: &mut RasterFrame, session: &ScanSession<O, V>, fps: &str)
where
    O: redeem_scanner::CameraOpener,
    V: redeem_scanner::Verifier,
{
    let width = screen.width.saturating_sub(16);
    let mut lines: Vec<(String, u32)> = Vec::new();

    let stats = session.loop_stats();
    lines.push((
        format!(
            "{} | {} | decodes {}/{} | {}",
            status_text(session.state()),
            session.decoder_name(),
            stats.hits,
            stats.attempts,
            fps
        ),
        WHITE,
    ));

    if let Some(code) = session.last_code() {
        lines.push((format!("CODE: {code}"), WHITE));
    }

    match session.state() {
        ScanState::Done(Verdict::Validated(data)) => lines.push((format!("VALID: {data}"), GREEN)),
        ScanState::Done(Verdict::NotFound(message)) => {
            let why = message.as_deref().unwrap_or("no such token");
            lines.push((format!("NOT FOUND: {why}"), AMBER));
        }
        ScanState::Errored(e) => lines.push((e.to_string(), RED)),
        ScanState::Verifying => lines.push(("VERIFYING...".to_string(), AMBER)),
        _ => {}
    }

    let hint = match session.state() {
        ScanState::Idle => "ENTER: start camera  ESC: quit",
        ScanState::Scanning { .. } => "SPACE: pause/resume  S: snapshot  R: reset  ESC: quit",
        ScanState::Done(_) => "N: scan next  R: reset  ESC: quit",
        _ => "R: reset  ESC: quit",
    };
    lines.push((hint.to_string(), WHITE));

    shade_rect(screen, 4, 4, screen.width.saturating_sub(8), lines.len() * LINE_HEIGHT + 6);
    for (i, (text, color)) in lines.iter().enumerate() {
        let y = 8 + (i * LINE_HEIGHT) as i32;
        draw_text_5x7(screen, 8, y, &fit_text(text, width), *color);
    }
}
