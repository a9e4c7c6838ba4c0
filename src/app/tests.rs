use super::*;
use crate::config::DecoycamConfig;
use crate::events::DecoycamEvent;
use crate::permission::PermissionStatus;
use crate::state::RecordingState;
use std::time::{Duration, SystemTime};
use tokio::time::{sleep, timeout};

fn create_test_config(base: &std::path::Path) -> DecoycamConfig {
    let mut config = DecoycamConfig::default();
    config.storage.base_path = base.to_string_lossy().to_string();
    config.capture.device_index = 99;
    config.capture.settle_delay_ms = 10;
    config.decoy.enabled = false;
    config.gesture.keyboard = false;
    config.permission.fixed_status = Some(PermissionStatus::Authorized);
    config
}

#[tokio::test]
async fn test_app_creation() {
    let temp = tempfile::tempdir().unwrap();
    let app = DecoycamApp::new(create_test_config(temp.path())).unwrap();

    assert!(app.controller().is_none());
    assert!(app.keyboard.is_none());
    assert!(app.get_all_component_states().await.is_empty());
}

#[tokio::test]
async fn test_start_and_shutdown() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = DecoycamApp::new(create_test_config(temp.path())).unwrap();

    app.start().await.unwrap();
    assert_eq!(
        app.get_component_state("controller").await,
        Some(ComponentState::Running)
    );
    assert_eq!(
        app.controller().unwrap().state(),
        RecordingState::Idle
    );

    let exit_code = app.shutdown().await.unwrap();
    assert_eq!(exit_code, 0);
    assert!(app.controller().is_none());
    assert_eq!(
        app.get_component_state("controller").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn test_missing_camera_keeps_app_idle() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = DecoycamApp::new(create_test_config(temp.path())).unwrap();
    app.start().await.unwrap();

    let bus = app.event_bus();
    let mut events = bus.subscribe();
    bus.publish(DecoycamEvent::ToggleGesture {
        timestamp: SystemTime::now(),
    })
    .await
    .unwrap();

    let error = timeout(Duration::from_secs(3), async {
        loop {
            if let DecoycamEvent::SystemError { component, .. } = events.recv().await.unwrap() {
                return component;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(error, "capture");

    sleep(Duration::from_millis(50)).await;
    assert_eq!(app.controller().unwrap().state(), RecordingState::Idle);

    app.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_exits_on_shutdown_request() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = DecoycamApp::new(create_test_config(temp.path())).unwrap();
    app.start().await.unwrap();

    let bus = app.event_bus();
    tokio::spawn(async move {
        sleep(Duration::from_millis(50)).await;
        let _ = bus
            .publish(DecoycamEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: "test".to_string(),
            })
            .await;
    });

    let exit_code = timeout(Duration::from_secs(5), app.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
    assert!(app.controller().is_none());
}

#[tokio::test]
async fn test_run_twice_fails() {
    let temp = tempfile::tempdir().unwrap();
    let mut app = DecoycamApp::new(create_test_config(temp.path())).unwrap();
    app.shutdown_sender.take();

    assert!(app.run().await.is_err());
}
