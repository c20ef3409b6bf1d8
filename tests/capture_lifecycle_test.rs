// Integration tests for the capture lifecycle on the synthetic backend
//
// These run the real recorder worker, live analysis loop and finalizer
// against the stub backend's input thread.

use std::sync::Arc;
use std::time::Duration;

use foley_dub::analysis::analyze_characteristics;
use foley_dub::audio::RecordingFormat;
use foley_dub::catalog::{Catalog, ItemId};
use foley_dub::config::{AnalysisConfig, CaptureConfig};
use foley_dub::engine::{CaptureController, CaptureEvent, RecorderState, StubBackend};
use foley_dub::error::CaptureError;
use foley_dub::testing::Signal;
use futures::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn capture_config() -> CaptureConfig {
    CaptureConfig {
        fft_size: 256,
        chunk_interval_ms: 20,
        frame_interval_ms: 20,
        buffer_size: 160,
        ..CaptureConfig::default()
    }
}

fn setup(signal: Signal) -> (Arc<StubBackend>, CaptureController) {
    let backend = Arc::new(StubBackend::new());
    backend.set_signal(signal);
    let controller = CaptureController::new(backend.clone(), capture_config());
    (backend, controller)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_recording_lifecycle() {
    let (_backend, controller) = setup(Signal::default());
    let mut events = controller.subscribe_capture_events().unwrap();

    controller.start_recording().unwrap();
    assert_eq!(controller.state(), RecorderState::Recording);
    assert_eq!(events.recv().await.unwrap(), CaptureEvent::RecordingStarted);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(controller.elapsed_secs() > 0.0);
    assert!(!controller.live_series().volume.is_empty());

    let recorded = controller.stop_recording().await.unwrap().unwrap();
    assert_eq!(controller.state(), RecorderState::Stopped);
    assert!(!recorded.is_empty());
    assert_eq!(recorded.format, RecordingFormat::WavFloat);
    assert!(recorded.duration > 0.2, "duration {}", recorded.duration);
    assert!(!recorded.volume_data.is_empty());
    assert!(recorded
        .volume_data
        .windows(2)
        .all(|pair| pair[0].time <= pair[1].time));

    match events.recv().await.unwrap() {
        CaptureEvent::RecordingStopped { size, .. } => assert_eq!(size, recorded.size),
        other => panic!("unexpected event {:?}", other),
    }

    // The artifact outlives the controller's own cleanup
    controller.cleanup(true);
    assert!(!controller.has_stream());
    assert!(recorded.buffer.is_some());
}

async fn wait_until_settled(controller: &CaptureController) -> RecorderState {
    for _ in 0..100 {
        let state = controller.state();
        if state != RecorderState::Stopping {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    controller.state()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_stop_still_finishes_the_attempt() {
    let (backend, controller) = setup(Signal::default());
    controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The caller gives up on the stop almost immediately
    let _ = tokio::time::timeout(Duration::from_micros(1), controller.stop_recording()).await;

    assert_eq!(wait_until_settled(&controller).await, RecorderState::Stopped);
    assert!(!controller.has_stream());
    assert!(controller.stop_recording().await.unwrap().is_none());

    controller.start_recording().unwrap();
    assert_eq!(backend.open_count(), 2);
    tokio::time::sleep(Duration::from_millis(200)).await;
    let recorded = controller.stop_recording().await.unwrap().unwrap();
    assert!(!recorded.is_empty());
    assert_eq!(controller.state(), RecorderState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_late_stop_leaves_the_next_attempt_alone() {
    let (_backend, controller) = setup(Signal::default());
    controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let _ = tokio::time::timeout(Duration::from_micros(1), controller.stop_recording()).await;
    controller.cleanup(false);
    controller.start_recording().unwrap();

    // Whenever the abandoned stop settles, the new attempt keeps running
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(controller.is_recording());
    assert!(controller.has_stream());
    assert!(!controller.live_series().volume.is_empty());

    let recorded = controller.stop_recording().await.unwrap().unwrap();
    assert!(!recorded.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_without_input_returns_empty_artifact() {
    let (backend, controller) = setup(Signal::default());
    backend.set_input_enabled(false);
    let mut events = controller.subscribe_capture_events().unwrap();

    controller.start_recording().unwrap();
    assert_eq!(events.recv().await.unwrap(), CaptureEvent::RecordingStarted);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let recorded = controller.stop_recording().await.unwrap().unwrap();
    assert_eq!(recorded.size, 0);
    assert_eq!(recorded.duration, 0.0);
    assert!(recorded.is_empty());
    assert_eq!(controller.state(), RecorderState::Stopped);

    let stopped = loop {
        match events.recv().await.unwrap() {
            CaptureEvent::RecordingStopped { size, duration } => break (size, duration),
            CaptureEvent::CleanedUp { .. } => continue,
            other => panic!("unexpected event {:?}", other),
        }
    };
    assert_eq!(stopped, (0, 0.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_live_samples_stream_while_recording() {
    let (_backend, controller) = setup(Signal::Sine {
        frequency_hz: 440.0,
        amplitude: 0.8,
    });
    let mut samples = Box::pin(controller.live_sample_stream());

    controller.start_recording().unwrap();
    let sample = tokio::time::timeout(Duration::from_secs(2), samples.next())
        .await
        .expect("live sample within two seconds")
        .expect("stream open");
    assert_eq!(sample.frequency_data.len(), 128);
    assert_eq!(sample.time_domain_data.len(), 256);

    controller.stop_recording().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stream_failure_then_retry() {
    let (backend, controller) = setup(Signal::default());
    controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    backend.inject_stream_error("device unplugged");
    let mut failure = None;
    for _ in 0..50 {
        failure = controller.poll_recorder_health();
        if failure.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(matches!(failure, Some(CaptureError::RecorderFailed { .. })));
    assert_eq!(controller.state(), RecorderState::Error);

    // Stopping after a failure is benign and a new attempt may start
    assert!(controller.stop_recording().await.unwrap().is_none());
    controller.start_recording().unwrap();
    assert!(controller.is_recording());
    controller.cleanup(true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_negotiated_format_is_used() {
    let (backend, controller) = setup(Signal::default());
    backend.set_supported_formats(&[RecordingFormat::L16]);

    controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let recorded = controller.stop_recording().await.unwrap().unwrap();
    assert_eq!(recorded.format, RecordingFormat::L16);
    assert!(!recorded.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_captured_take_is_analyzed_from_audio() {
    let (_backend, controller) = setup(Signal::Sine {
        frequency_hz: 440.0,
        amplitude: 0.5,
    });
    controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    let recorded = controller.stop_recording().await.unwrap().unwrap();

    let catalog = Catalog::builtin();
    let result = analyze_characteristics(
        &recorded,
        &[ItemId::from("metal")],
        &catalog,
        &AnalysisConfig::default(),
        &mut StdRng::seed_from_u64(7),
    );
    assert!(!result.simulated);
    assert!(result.volume > 70, "volume {}", result.volume);
    assert!((result.duration - recorded.duration).abs() < 1e-3);
}

#[tokio::test]
async fn test_suspended_engine_waits_for_gesture() {
    let (backend, controller) = setup(Signal::default());
    backend.suspend();
    backend.set_resume_allowed(false);

    assert_eq!(
        controller.start_recording(),
        Err(CaptureError::NeedsUserGesture)
    );
    assert!(controller.is_waiting_for_gesture());

    backend.set_resume_allowed(true);
    assert_eq!(controller.notify_user_gesture(), Ok(true));
    controller.start_recording().unwrap();
    controller.cleanup(true);
}
