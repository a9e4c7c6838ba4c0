use super::testing::{FakeBackend, FakeBehaviour};
use super::*;
use crate::error::CaptureError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn test_session_configuration_order() {
    let backend = FakeBackend::new();
    let session = CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();

    assert!(!session.is_degraded());
    assert_eq!(session.preset(), SessionPreset::High);
    assert_eq!(
        backend.calls(),
        vec!["set_preset:High", "add_video_input", "add_file_sink"]
    );
}

#[tokio::test]
async fn test_missing_device_aborts_configuration() {
    let backend = FakeBackend::with(FakeBehaviour {
        no_device: true,
        ..FakeBehaviour::default()
    });

    let result = CaptureSession::configure(backend.as_ref(), SessionPreset::High, false);
    assert!(matches!(
        result,
        Err(CaptureError::DeviceUnavailable { .. })
    ));
    assert_eq!(backend.count("add_file_sink"), 0);
}

#[tokio::test]
async fn test_rejected_sink_degrades_or_aborts() {
    let backend = FakeBackend::with(FakeBehaviour {
        reject_sink: true,
        ..FakeBehaviour::default()
    });

    let mut session =
        CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();
    assert!(session.is_degraded());
    assert!(session.degraded_reason().unwrap().contains("sink rejected"));

    let dir = tempfile::tempdir().unwrap();
    let result = session.start(&dir.path().join("out.mp4"));
    assert!(matches!(
        result,
        Err(CaptureError::SinkAttachFailure { .. })
    ));
    assert_eq!(backend.count("begin_writing"), 0);

    let strict = CaptureSession::configure(backend.as_ref(), SessionPreset::High, true);
    assert!(matches!(
        strict,
        Err(CaptureError::SinkAttachFailure { .. })
    ));
}

#[tokio::test]
async fn test_start_twice_without_stop_is_rejected() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let mut session =
        CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();

    let _completion = session.start(&dir.path().join("a.mp4")).unwrap();
    assert!(session.is_writing());
    assert_eq!(session.output_path(), Some(dir.path().join("a.mp4").as_path()));

    let second = session.start(&dir.path().join("b.mp4"));
    assert!(matches!(second, Err(CaptureError::AlreadyWriting { .. })));
    assert_eq!(backend.count("begin_writing"), 1);
}

#[tokio::test]
async fn test_completion_fires_once_with_path() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.mp4");
    let mut session =
        CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();

    session.start_running().await.unwrap();
    let completion = session.start(&path).unwrap();
    assert_eq!(completion.path(), path.as_path());

    assert!(session.stop());
    assert!(!session.stop());

    let outcome = timeout(Duration::from_secs(2), completion).await.unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.path, path);
    assert!(path.exists());
    assert_eq!(backend.count("finish_writing"), 1);
}

#[tokio::test]
async fn test_finalize_failure_is_reported() {
    let backend = FakeBackend::with(FakeBehaviour {
        fail_finalize: true,
        ..FakeBehaviour::default()
    });
    let dir = tempfile::tempdir().unwrap();
    let mut session =
        CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();

    let completion = session.start(&dir.path().join("clip.mp4")).unwrap();
    session.stop();

    let outcome = timeout(Duration::from_secs(2), completion).await.unwrap();
    assert!(matches!(
        outcome.error,
        Some(CaptureError::WriteFinalizeFailure { .. })
    ));
}

#[tokio::test]
async fn test_release_finalizes_before_stopping_pipeline() {
    let backend = FakeBackend::new();
    let dir = tempfile::tempdir().unwrap();
    let mut session =
        CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();

    session.start_running().await.unwrap();
    let completion = session.start(&dir.path().join("clip.mp4")).unwrap();

    timeout(Duration::from_secs(2), session.release())
        .await
        .unwrap()
        .unwrap();
    timeout(Duration::from_secs(2), completion).await.unwrap();

    let calls = backend.calls();
    let finish = calls.iter().position(|c| c == "finish_writing").unwrap();
    let stop = calls.iter().position(|c| c == "stop_running").unwrap();
    assert!(finish < stop);
    assert_eq!(backend.count("finish_writing"), 1);
}

#[tokio::test]
async fn test_stop_during_slow_start_does_not_block() {
    let backend = FakeBackend::with(FakeBehaviour {
        start_delay: Some(Duration::from_millis(800)),
        ..FakeBehaviour::default()
    });
    let mut session =
        CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();

    let running = tokio::spawn(session.start_running());
    let backend_ref = Arc::clone(&backend);
    timeout(Duration::from_secs(2), async move {
        while backend_ref.count("start_running") == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let stopping = Instant::now();
    assert!(session.stop());
    assert!(stopping.elapsed() < Duration::from_millis(200));

    timeout(Duration::from_secs(3), session.release())
        .await
        .unwrap()
        .unwrap();
    running.await.unwrap().unwrap();

    let calls = backend.calls();
    let start = calls.iter().position(|c| c == "start_running").unwrap();
    let finish = calls.iter().position(|c| c == "finish_writing").unwrap();
    let stop = calls.iter().position(|c| c == "stop_running").unwrap();
    assert!(start < finish && finish < stop);
}

#[tokio::test]
async fn test_stop_without_write_still_finalizes_once() {
    let backend = FakeBackend::new();
    let mut session =
        CaptureSession::configure(backend.as_ref(), SessionPreset::High, false).unwrap();

    assert!(session.stop());
    assert!(!session.stop());
    timeout(Duration::from_secs(2), session.release())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(backend.count("finish_writing"), 1);
    assert_eq!(backend.count("stop_running"), 1);
}

#[tokio::test]
async fn test_pipeline_start_failure_surfaces() {
    let backend = FakeBackend::with(FakeBehaviour {
        fail_start: true,
        ..FakeBehaviour::default()
    });
    let session = CaptureSession::configure(backend.as_ref(), SessionPreset::Low, false).unwrap();

    let result = session.start_running().await;
    assert!(matches!(result, Err(CaptureError::PipelineStart { .. })));
}

#[tokio::test]
async fn test_unavailable_backend_has_no_device() {
    let result = CaptureSession::configure(&UnavailableCaptureBackend, SessionPreset::High, false);
    assert!(matches!(
        result,
        Err(CaptureError::DeviceUnavailable { .. })
    ));
}

#[test]
fn test_preset_resolutions_descend() {
    let high = SessionPreset::High.resolution();
    let medium = SessionPreset::Medium.resolution();
    let low = SessionPreset::Low.resolution();
    assert!(high.0 > medium.0 && medium.0 > low.0);
    assert_eq!(SessionPreset::highest(), SessionPreset::High);
}
