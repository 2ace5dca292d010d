//! Background janitors for remote file hygiene.
//!
//! Two periodic sweeps keep uploaded assistant files from leaking: a liveness
//! probe that drops files attached to a thread the platform no longer knows,
//! and a timestamp sweep that removes files past a maximum age regardless of
//! thread state. Both are scoped by the session's cancellation token and skip
//! missed ticks instead of bursting after a stall.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::session::SessionHandle;

#[derive(Debug, Clone, Copy)]
pub struct JanitorConfig {
    pub liveness_interval: Duration,
    pub age_sweep_interval: Duration,
    pub max_file_age: Duration,
}

/// Spawns both sweeps. The returned handles finish when the session's
/// cancellation token fires.
pub fn spawn(session: SessionHandle, config: JanitorConfig) -> Vec<JoinHandle<()>> {
    let liveness = {
        let session = session.clone();
        tokio::spawn(async move {
            info!("session liveness monitor started");
            let cancel = session.cancellation_token();
            let mut ticker = tokio::time::interval(config.liveness_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => liveness_cycle(&session).await,
                }
            }
        })
    };

    let age_sweep = tokio::spawn(async move {
        info!("file age monitor started");
        let cancel = session.cancellation_token();
        let mut ticker = tokio::time::interval(config.age_sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => age_sweep_cycle(&session, config.max_file_age).await,
            }
        }
    });

    vec![liveness, age_sweep]
}

/// One liveness probe. Files are only cleaned when the platform positively
/// reports the thread gone; transport errors leave state untouched.
pub async fn liveness_cycle(session: &SessionHandle) {
    let (thread_id, file_count) = {
        let state = session.read().await;
        (state.thread_id.clone(), state.session_files.len())
    };
    let Some(thread_id) = thread_id else { return };
    if file_count == 0 {
        return;
    }

    match session.api.retrieve_thread(&thread_id).await {
        Ok(_) => {
            info!(thread_id = %thread_id, files = file_count, "thread alive");
        }
        Err(e) if e.is_not_found() => {
            warn!(thread_id = %thread_id, "thread not found, cleaning orphaned files");
            cleanup_orphaned_files(session).await;
        }
        Err(e) => {
            error!(thread_id = %thread_id, error = %e, "thread liveness check failed");
        }
    }
}

async fn cleanup_orphaned_files(session: &SessionHandle) {
    let files = session.read().await.session_files.clone();
    info!(count = files.len(), "removing orphaned files");
    for file in &files {
        match session.api.delete_file(&file.file_id).await {
            Ok(()) => info!(file = %file.filename, "orphaned file removed"),
            Err(e) => warn!(file = %file.filename, error = %e, "orphaned file removal failed"),
        }
    }
    let mut state = session.write().await;
    state.session_files.clear();
    state.thread_id = None;
}

/// One timestamp sweep: deletes every session file strictly older than
/// `max_age` and drops it from the current-file list.
pub async fn age_sweep_cycle(session: &SessionHandle, max_age: Duration) {
    let now = Utc::now();
    let old: Vec<_> = session
        .read()
        .await
        .session_files
        .iter()
        .filter(|f| {
            (now - f.uploaded_at).num_seconds() > max_age.as_secs() as i64
        })
        .cloned()
        .collect();
    if old.is_empty() {
        return;
    }

    info!(count = old.len(), "removing files past maximum age");
    for file in &old {
        match session.api.delete_file(&file.file_id).await {
            Ok(()) => info!(file = %file.filename, "old file removed"),
            Err(e) => warn!(file = %file.filename, error = %e, "old file removal failed"),
        }
    }
    let mut state = session.write().await;
    state
        .session_files
        .retain(|f| !old.iter().any(|o| o.file_id == f.file_id));
}
