// Janitor sweeps against a scripted assistant backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use common::FakeApi;
use leyia::janitor;
use leyia::openai::OpenAiError;
use leyia::session::{FileInfo, SessionHandle};

fn session_with(api: Arc<FakeApi>) -> (SessionHandle, mpsc::UnboundedReceiver<leyia::session::UiEvent>) {
    let (updates, rx) = mpsc::unbounded_channel();
    let handle = SessionHandle::new(api, "asst_test", true, Duration::from_secs(600), updates);
    (handle, rx)
}

fn file(id: &str, age_secs: i64) -> FileInfo {
    FileInfo {
        file_id: id.to_string(),
        filename: format!("{}.pdf", id),
        uploaded_at: Utc::now() - chrono::Duration::seconds(age_secs),
    }
}

#[tokio::test]
async fn orphaned_thread_clears_files_and_thread_id() {
    let api = Arc::new(FakeApi::new());
    let (session, _events) = session_with(api.clone());
    {
        let mut state = session.write().await;
        state.thread_id = Some("thread_gone".to_string());
        state.session_files = vec![file("file-a", 10), file("file-b", 20)];
    }

    janitor::liveness_cycle(&session).await;

    let state = session.read().await;
    assert!(state.session_files.is_empty());
    assert_eq!(state.thread_id, None);
    let deleted = api.deleted.lock().unwrap();
    assert_eq!(*deleted, vec!["file-a".to_string(), "file-b".to_string()]);
}

#[tokio::test]
async fn live_thread_keeps_files() {
    let api = Arc::new(FakeApi::with_live_thread("thread_ok"));
    let (session, _events) = session_with(api.clone());
    {
        let mut state = session.write().await;
        state.thread_id = Some("thread_ok".to_string());
        state.session_files = vec![file("file-a", 10)];
    }

    janitor::liveness_cycle(&session).await;

    let state = session.read().await;
    assert_eq!(state.session_files.len(), 1);
    assert_eq!(state.thread_id.as_deref(), Some("thread_ok"));
    assert!(api.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn transport_error_leaves_state_untouched() {
    let api = Arc::new(FakeApi::new());
    *api.retrieve_error.lock().unwrap() = Some(OpenAiError::Api {
        status: 500,
        message: "upstream unavailable".to_string(),
    });
    let (session, _events) = session_with(api.clone());
    {
        let mut state = session.write().await;
        state.thread_id = Some("thread_x".to_string());
        state.session_files = vec![file("file-a", 10)];
    }

    janitor::liveness_cycle(&session).await;

    // Only a positive not-found verdict may clean up.
    let state = session.read().await;
    assert_eq!(state.session_files.len(), 1);
    assert_eq!(state.thread_id.as_deref(), Some("thread_x"));
    assert!(api.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn idle_session_skips_liveness_probe() {
    let api = Arc::new(FakeApi::new());
    let (session, _events) = session_with(api.clone());
    session.write().await.thread_id = Some("thread_x".to_string());

    // No session files, so even a dead thread is left alone.
    janitor::liveness_cycle(&session).await;
    assert_eq!(session.read().await.thread_id.as_deref(), Some("thread_x"));
}

#[tokio::test]
async fn age_sweep_removes_only_expired_files() {
    let api = Arc::new(FakeApi::new());
    let (session, _events) = session_with(api.clone());
    {
        let mut state = session.write().await;
        state.session_files = vec![
            file("file-old", 7201),
            file("file-edge", 7199),
            file("file-new", 60),
        ];
    }

    janitor::age_sweep_cycle(&session, Duration::from_secs(7200)).await;

    let state = session.read().await;
    let kept: Vec<&str> = state.session_files.iter().map(|f| f.file_id.as_str()).collect();
    assert_eq!(kept, vec!["file-edge", "file-new"]);
    assert_eq!(*api.deleted.lock().unwrap(), vec!["file-old".to_string()]);
}

#[tokio::test]
async fn cleanup_session_files_is_best_effort_and_clears_list() {
    let api = Arc::new(FakeApi::new());
    let (session, _events) = session_with(api.clone());
    session.write().await.session_files = vec![file("file-a", 5), file("file-b", 5)];

    session.cleanup_session_files().await;
    assert!(session.read().await.session_files.is_empty());
    assert_eq!(api.deleted.lock().unwrap().len(), 2);

    // Re-running with nothing to do stays quiet.
    session.cleanup_session_files().await;
    assert_eq!(api.deleted.lock().unwrap().len(), 2);
}
