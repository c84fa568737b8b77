// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Inspecting the virtual cameras
//! - Running the EV resolver and crop math on given inputs
//! - Taking photos and streaming with a virtual session

use camera_engine::backends::camera::{
    CaptureDevice, DeviceCapabilities, LensFacing, VirtualCamera,
};
use camera_engine::config::EngineConfig;
use camera_engine::constants::{self, frame_duration_ns};
use camera_engine::controls::exposure::{EvBaseline, ExposureLimits, resolve_ev};
use camera_engine::geometry::{CropGeometry, Rect, crop_region};
use camera_engine::storage::DirectorySink;
use camera_engine::{AspectMode, CameraEngine, SessionState};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How long to wait for the virtual session to start streaming
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Photo command settings
pub struct PhotoOptions {
    pub aspect: AspectMode,
    pub zoom: f32,
    pub front: bool,
    pub exposure_ns: Option<i64>,
    pub iso: Option<i32>,
    pub ev: Option<f64>,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };
    Ok(config)
}

/// Print the capabilities of both virtual lenses
pub fn print_capabilities(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut camera = VirtualCamera::new();
    let mut all: Vec<DeviceCapabilities> = Vec::new();
    for facing in [LensFacing::Back, LensFacing::Front] {
        all.push(camera.query_capabilities(facing)?);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    println!("Virtual cameras ({}):", camera.name());
    println!();
    for caps in &all {
        println!("  [{}]", caps.facing);
        println!("      Sensor:       {} ({})", caps.sensor_active_rect.size(), caps.sensor_orientation);
        println!("      ISO:          {}", caps.iso_range);
        println!(
            "      Exposure:     {:.1}µs - {:.1}ms",
            caps.exposure_time_range.lower as f64 / 1_000.0,
            caps.exposure_time_range.upper as f64 / 1_000_000.0
        );
        println!("      EV:           {}", caps.ae_compensation_range);
        println!("      Max zoom:     {}x", caps.max_digital_zoom);
        println!("      Flash:        {}", if caps.flash_available { "yes" } else { "no" });
        let sizes: Vec<String> = caps
            .supported_output_sizes
            .iter()
            .map(|s| s.to_string())
            .collect();
        println!("      Output sizes: {}", sizes.join(", "));
        println!();
    }
    Ok(())
}

/// Run the EV resolver against the default device ranges
pub fn run_resolve_ev(
    ev: f64,
    exposure_ns: i64,
    iso: i32,
    fps: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let caps = DeviceCapabilities::default();
    let limits = ExposureLimits {
        min_exposure_ns: constants::MIN_EV_EXPOSURE_NS,
        max_device_exposure_ns: caps.exposure_time_range.upper,
        iso_range: caps.iso_range,
        frame_budget_ns: frame_duration_ns(fps),
        margin_ns: constants::EXPOSURE_MARGIN_NS,
    };
    let baseline = EvBaseline {
        exposure_time_ns: exposure_ns,
        iso,
    };
    let resolved = resolve_ev(ev, baseline, &limits);

    println!("Baseline:  {} ns @ ISO {}", exposure_ns, iso);
    println!("EV:        {:+} (factor {:.4})", ev, 2f64.powf(ev));
    println!(
        "Budget:    {} ns ({} fps, margin {} ns)",
        limits.exposure_window().upper,
        fps,
        limits.margin_ns
    );
    println!("Exposure:  {} ns", resolved.exposure_time_ns);
    println!("ISO:       {}", resolved.iso);
    Ok(())
}

/// Print the crop region for a sensor, framing mode and zoom
pub fn print_crop(
    width: i32,
    height: i32,
    zoom: f32,
    max_zoom: f32,
    aspect: AspectMode,
) -> Result<(), Box<dyn std::error::Error>> {
    if width <= 0 || height <= 0 {
        return Err("Sensor dimensions must be positive".into());
    }
    let active = Rect::new(0, 0, width, height);
    let geometry = CropGeometry {
        aspect,
        zoom: zoom.clamp(1.0, max_zoom.max(1.0)),
        max_zoom,
        tall_zoom_bias: constants::DEFAULT_TALL_ZOOM_BIAS,
    };
    let crop = crop_region(active, &geometry);
    println!("Sensor:         {}", active);
    println!("Framing:        {}", aspect);
    println!("Effective zoom: {:.3}x", geometry.effective_zoom());
    println!("Crop region:    {}", crop);
    Ok(())
}

/// Take a photo with a virtual session
pub fn take_photo(
    config_path: Option<&Path>,
    output: Option<PathBuf>,
    options: PhotoOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = output {
        config.photo_dir = dir;
    }
    config.default_aspect_mode = options.aspect;
    println!("Output: {}", config.photo_dir.display());

    let sink = Arc::new(DirectorySink::new(config.photo_dir.clone()));
    let mut engine = CameraEngine::start(VirtualCamera::new(), sink, config)?;
    if options.front {
        engine.switch_camera_facing();
    }
    if options.exposure_ns.is_some() || options.iso.is_some() {
        engine.set_manual_enabled(true);
    }
    if let Some(ns) = options.exposure_ns {
        engine.set_exposure_time_ns(ns);
    }
    if let Some(iso) = options.iso {
        engine.set_iso(iso);
    }
    engine.resume();
    if !engine.wait_for_state(SessionState::Streaming, OPEN_TIMEOUT) {
        engine.shutdown()?;
        return Err(format!("Camera did not start (state: {:?})", engine.state()).into());
    }

    // Zoom limits are known once the device is open
    engine.set_zoom(options.zoom);
    if let Some(ev) = options.ev {
        engine.set_ev_compensation(ev);
    }

    println!("Capturing...");
    let result = engine.take_picture().wait();
    let params = engine.parameters();
    engine.shutdown()?;
    let photo = result?;

    println!(
        "Settings: {} framing, zoom {:.2}x, {}",
        params.aspect_mode,
        params.zoom_factor,
        if params.manual_enabled {
            format!("{} ns @ ISO {}", params.exposure_time_ns, params.iso)
        } else {
            format!("auto exposure, EV {:+}", params.ev_compensation)
        }
    );
    println!("Photo saved: {} ({}x{})", photo.locator, photo.width, photo.height);
    Ok(())
}

/// Stream a virtual session and print the smoothed frame rate
pub fn stream(
    config_path: Option<&Path>,
    duration: u64,
    fps: u32,
    pixel_rate: Option<u64>,
    adaptive: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path)?;
    config.default_target_fps = fps;
    config.adaptive_resolution = adaptive;

    let mut camera = VirtualCamera::new();
    if let Some(rate) = pixel_rate {
        camera = camera.with_pixel_rate(rate);
    }
    let sink = Arc::new(DirectorySink::new(config.photo_dir.clone()));
    let mut engine = CameraEngine::start(camera, sink, config)?;
    engine.on_error(|err| eprintln!("Error: {}", err));
    engine.resume();
    if !engine.wait_for_state(SessionState::Streaming, OPEN_TIMEOUT) {
        engine.shutdown()?;
        return Err("Camera did not start".into());
    }

    println!(
        "Streaming at target {} fps (press Ctrl+C to stop early)",
        engine.parameters().target_fps
    );

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);
    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        let transform = engine.preview_transform();
        print!(
            "\r{:>5.1} fps  state {:?}  preview scale {:.3}   ",
            engine.smoothed_fps(),
            engine.state(),
            transform.scale
        );
        std::io::Write::flush(&mut std::io::stdout())?;
        std::thread::sleep(Duration::from_millis(250));
    }
    println!();

    engine.pause()?;
    engine.shutdown()?;
    println!("Stream stopped");
    Ok(())
}
