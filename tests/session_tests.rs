// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the camera engine, driven by the virtual camera

use camera_engine::backends::camera::{
    FaultPlan, LensFacing, VirtualCamera, VirtualCameraHandle,
};
use camera_engine::request::AeMode;
use camera_engine::storage::{DirectorySink, ImageSink, MemorySink, SinkError};
use camera_engine::{
    AppError, AspectMode, CameraEngine, CameraError, EngineConfig, PhotoError, SessionState,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

fn config() -> EngineConfig {
    EngineConfig {
        photo_dir: std::env::temp_dir(),
        ..EngineConfig::default()
    }
}

fn start_with(config: EngineConfig) -> (CameraEngine, VirtualCameraHandle, MemorySink) {
    let camera = VirtualCamera::new();
    let handle = camera.handle();
    let sink = MemorySink::new();
    let engine = CameraEngine::start(camera, Arc::new(sink.clone()), config).unwrap();
    (engine, handle, sink)
}

fn streaming_engine() -> (CameraEngine, VirtualCameraHandle, MemorySink) {
    let (engine, handle, sink) = start_with(config());
    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
    (engine, handle, sink)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn collect_errors(engine: &CameraEngine) -> Arc<Mutex<Vec<AppError>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    engine.on_error(move |err| sink.lock().unwrap().push(err.clone()));
    errors
}

#[test]
fn test_lifecycle_open_pause_resume() {
    let (mut engine, handle, _sink) = start_with(config());
    assert_eq!(engine.state(), SessionState::Closed);
    let mut states = engine.subscribe_state();

    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Streaming);
    let stats = handle.stats();
    assert_eq!(stats.opens, 1);
    assert_eq!(stats.configurations.len(), 1);
    assert!(stats.repeating_requests >= 1);
    assert_eq!(stats.capability_queries, vec![LensFacing::Back]);

    // Pause blocks until the device is released
    engine.pause().unwrap();
    assert_eq!(engine.state(), SessionState::Closed);
    assert_eq!(handle.stats().closes, 1);

    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
    assert_eq!(handle.stats().opens, 2);

    engine.shutdown().unwrap();
    assert_eq!(handle.stats().closes, 2);
}

#[test]
fn test_hot_apply_keeps_session_and_reconfigure_rebuilds_it() {
    let (engine, handle, _sink) = streaming_engine();

    engine.set_manual_enabled(true);
    engine.set_iso(800);
    assert!(wait_until(|| {
        handle
            .stats()
            .last_repeating
            .is_some_and(|request| request.iso == Some(800))
    }));
    let stats = handle.stats();
    assert_eq!(stats.configurations.len(), 1);
    assert_eq!(stats.opens, 1);
    assert_eq!(
        stats.last_repeating.map(|request| request.ae_mode),
        Some(AeMode::Off)
    );
    assert_eq!(engine.state(), SessionState::Streaming);

    // 3:4 -> 9:16 needs new output sizes
    assert_eq!(engine.cycle_aspect_mode(), AspectMode::Tall9x16);
    assert!(wait_until(|| handle.stats().configurations.len() == 2));
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
    let stats = handle.stats();
    assert_eq!(stats.opens, 2);
    assert_eq!(stats.configurations[1].preview_size.width, 1280);
    assert_eq!(stats.configurations[1].preview_size.height, 720);
    assert_eq!(engine.parameters().aspect_mode, AspectMode::Tall9x16);
}

#[test]
fn test_setter_burst_reconfigures_once() {
    let (engine, handle, _sink) = streaming_engine();

    for zoom in [1.5, 2.0, 2.5, 3.0] {
        engine.set_zoom(zoom);
    }
    engine.set_aspect_mode(AspectMode::Square);
    engine.set_aspect_mode(AspectMode::Full);
    engine.set_aspect_mode(AspectMode::Square);

    assert!(wait_until(|| engine.parameters().aspect_mode == AspectMode::Square));
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
    assert!(wait_until(|| engine.parameters().zoom_factor == 3.0));
    // At most one rebuild per drained batch, never one per setter
    assert!(handle.stats().configurations.len() <= 4);
}

#[test]
fn test_square_still_has_square_output() {
    let (mut engine, handle, sink) = start_with(EngineConfig {
        default_aspect_mode: AspectMode::Square,
        ..config()
    });
    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));

    let photo = engine.take_picture().wait().unwrap();
    let ratio = photo.width as f64 / photo.height as f64;
    assert!((ratio - 1.0).abs() < 0.01, "ratio {}", ratio);

    let images = sink.images();
    assert_eq!(images.len(), 1);
    let decoded = image::load_from_memory(&images[0].1).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (photo.width, photo.height));

    // The still carries the high quality flags and an orientation tag
    let request = handle.stats().last_capture.unwrap();
    assert!(request.jpeg_orientation.is_some());
    assert_eq!(engine.state(), SessionState::Streaming);
    engine.shutdown().unwrap();
}

#[test]
fn test_portrait_photo_written_to_directory() {
    let dir = tempfile::tempdir().unwrap();
    let camera = VirtualCamera::new();
    let sink = Arc::new(DirectorySink::new(dir.path()));
    let mut engine = CameraEngine::start(camera, sink, config()).unwrap();
    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));

    let photo = engine.take_picture().wait().unwrap();
    engine.shutdown().unwrap();

    // Upright 3:4
    let ratio = photo.width as f64 / photo.height as f64;
    assert!((ratio - 0.75).abs() < 0.01, "ratio {}", ratio);
    let path = std::path::Path::new(&photo.locator);
    assert!(path.exists());
    assert!(path.starts_with(dir.path()));
    let name = path.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("IMG_") && name.ends_with(".jpg"));
}

#[test]
fn test_switch_facing_resets_zoom_and_queries_front() {
    let (engine, handle, _sink) = streaming_engine();

    engine.set_zoom(3.0);
    assert!(wait_until(|| engine.parameters().zoom_factor == 3.0));

    engine.switch_camera_facing();
    assert!(wait_until(|| {
        handle.stats().capability_queries.last() == Some(&LensFacing::Front)
    }));
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
    assert_eq!(engine.parameters().zoom_factor, 1.0);

    // The front crop is derived from the front sensor
    assert!(wait_until(|| {
        handle
            .stats()
            .last_repeating
            .is_some_and(|request| request.crop_region.right() <= 3264)
    }));
}

#[test]
fn test_disconnect_closes_session_and_reports() {
    let (engine, handle, _sink) = streaming_engine();
    let errors = collect_errors(&engine);

    assert!(handle.disconnect());
    assert!(engine.wait_for_state(SessionState::Closed, TIMEOUT));
    assert!(wait_until(|| {
        errors
            .lock()
            .unwrap()
            .contains(&AppError::Camera(CameraError::DeviceDisconnected))
    }));

    // No automatic reopen; the caller resumes explicitly
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(engine.state(), SessionState::Closed);
    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
}

#[test]
fn test_concurrent_capture_is_rejected() {
    let (engine, _handle, sink) = streaming_engine();

    let first = engine.take_picture();
    let second = engine.take_picture();

    assert_eq!(
        second.wait(),
        Err(AppError::Photo(PhotoError::CaptureInProgress))
    );
    assert!(first.wait().is_ok());
    assert_eq!(sink.images().len(), 1);
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
}

#[test]
fn test_capture_requires_streaming() {
    let (engine, _handle, _sink) = start_with(config());
    assert_eq!(
        engine.take_picture().wait(),
        Err(AppError::Camera(CameraError::NotStreaming))
    );
}

#[test]
fn test_capture_failure_keeps_streaming() {
    let (engine, handle, sink) = streaming_engine();
    let errors = collect_errors(&engine);
    handle.set_faults(FaultPlan {
        fail_capture: true,
        ..FaultPlan::default()
    });

    let result = engine.take_picture().wait();
    assert!(matches!(
        result,
        Err(AppError::Photo(PhotoError::CaptureFailed(_)))
    ));
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
    assert!(sink.images().is_empty());
    assert_eq!(errors.lock().unwrap().len(), 1);

    handle.set_faults(FaultPlan::default());
    assert!(engine.take_picture().wait().is_ok());
}

#[test]
fn test_permission_denied_lands_in_error() {
    let (engine, handle, _sink) = start_with(config());
    let errors = collect_errors(&engine);
    handle.set_faults(FaultPlan {
        permission_denied: true,
        ..FaultPlan::default()
    });

    engine.resume();
    assert!(engine.wait_for_state(SessionState::Error, TIMEOUT));
    assert!(wait_until(|| {
        errors
            .lock()
            .unwrap()
            .iter()
            .any(|err| matches!(err, AppError::Camera(CameraError::PermissionDenied(_))))
    }));
    assert_eq!(handle.stats().opens, 0);

    // Manual retry after the fault is cleared
    handle.set_faults(FaultPlan::default());
    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));
}

#[test]
fn test_configure_failure_releases_device() {
    let (engine, handle, _sink) = start_with(config());
    handle.set_faults(FaultPlan {
        fail_configure: true,
        ..FaultPlan::default()
    });

    engine.resume();
    assert!(engine.wait_for_state(SessionState::Error, TIMEOUT));
    let stats = handle.stats();
    assert_eq!(stats.opens, 1);
    assert_eq!(stats.closes, 1);
}

#[test]
fn test_fps_is_reported() {
    let (engine, _handle, _sink) = streaming_engine();
    let samples = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&samples);
    engine.on_fps_changed(move |fps| sink.lock().unwrap().push(fps));

    assert!(wait_until(|| !samples.lock().unwrap().is_empty()));
    assert!(engine.smoothed_fps() > 0.0);
}

#[test]
fn test_preview_transform_follows_viewport() {
    let (engine, _handle, _sink) = streaming_engine();
    let mut overlay = engine.subscribe_preview_transform();

    // 1280x960 preview shown upright as 960x1280
    engine.set_viewport_size(1080, 1920);
    assert!(wait_until(|| (engine.preview_transform().scale - 1.5).abs() < 1e-3));
    let transform = engine.preview_transform();
    assert!((transform.visible_rect.width - 1080.0).abs() < 1e-2);
    assert!((transform.visible_rect.height - 1920.0).abs() < 1e-2);
    assert!(overlay.has_changed().unwrap());
    assert_eq!(*overlay.borrow_and_update(), transform);
}

#[test]
fn test_commands_after_shutdown_fail_cleanly() {
    let (mut engine, handle, _sink) = streaming_engine();
    engine.shutdown().unwrap();
    assert_eq!(handle.stats().closes, 1);

    assert_eq!(
        engine.take_picture().wait(),
        Err(AppError::Camera(CameraError::EngineStopped))
    );
    assert!(engine.pause().is_err());
    // A second shutdown is a no-op
    engine.shutdown().unwrap();
}

/// Sink that takes a while and then fails
struct SlowFailingSink {
    delay: Duration,
}

impl ImageSink for SlowFailingSink {
    fn save(&self, _bytes: &[u8], _suggested_name: &str) -> Result<String, SinkError> {
        std::thread::sleep(self.delay);
        Err(SinkError("disk gone".to_string()))
    }
}

#[test]
fn test_pause_waits_for_photo_in_pipeline() {
    let sink = Arc::new(SlowFailingSink {
        delay: Duration::from_millis(400),
    });
    let camera = VirtualCamera::new();
    let handle = camera.handle();
    let engine = CameraEngine::start(camera, sink, config()).unwrap();
    let errors = collect_errors(&engine);
    engine.resume();
    assert!(engine.wait_for_state(SessionState::Streaming, TIMEOUT));

    // Back to streaming after the still was taken: the photo is now in the
    // pipeline, sleeping in the sink
    let ticket = engine.take_picture();
    let still_taken = |engine: &CameraEngine| {
        engine.state() == SessionState::Streaming && handle.stats().captures == 1
    };
    assert!(wait_until(|| still_taken(&engine)));
    engine.pause().unwrap();

    // Everything the photo reports has happened by the time pause returns
    assert_eq!(engine.state(), SessionState::Closed);
    assert_eq!(errors.lock().unwrap().len(), 1);
    assert_eq!(
        ticket.wait(),
        Err(AppError::Photo(PhotoError::SaveFailed("disk gone".to_string())))
    );
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[test]
fn test_ev_set_in_auto_reaches_manual_still() {
    let (engine, handle, _sink) = streaming_engine();

    engine.set_exposure_time_ns(4_000_000);
    engine.set_iso(200);
    engine.set_ev_compensation(1.0);
    engine.set_manual_enabled(true);
    assert!(wait_until(|| engine.parameters().manual_enabled));

    engine.take_picture().wait().unwrap();
    let request = handle.stats().last_capture.unwrap();
    assert_eq!(request.exposure_time_ns, Some(8_000_000));
    assert_eq!(request.iso, Some(200));
    assert_eq!(engine.parameters().exposure_time_ns, 8_000_000);
}
