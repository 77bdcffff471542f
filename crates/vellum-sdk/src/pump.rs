//! Debounced, fire-and-forget WAL updates.
//!
//! Editors produce a content update on nearly every keystroke. [`WalPump`]
//! accepts them without blocking, keeps only the newest content per
//! document, and writes the survivors on a fixed interval from a blocking
//! worker thread.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use vellum_types::FileKey;

use crate::engine::Engine;

enum PumpMessage {
    Update(FileKey, String),
    Stop(FileKey, oneshot::Sender<()>),
    Flush(oneshot::Sender<()>),
}

/// Background task coalescing WAL updates for an [`Engine`].
///
/// Must be created inside a tokio runtime.
pub struct WalPump {
    tx: mpsc::UnboundedSender<PumpMessage>,
    task: JoinHandle<()>,
}

impl WalPump {
    /// Spawn the pump, flushing every `engine.config().pump_interval()`.
    pub fn spawn(engine: Arc<Engine>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(engine, rx));
        Self { tx, task }
    }

    /// Queue `content` as the latest state of `file_key`. Never blocks.
    pub fn update(&self, file_key: FileKey, content: String) {
        if self.tx.send(PumpMessage::Update(file_key, content)).is_err() {
            warn!("WAL pump has stopped; update dropped");
        }
    }

    /// Drop any queued update for `file_key` and remove its log.
    pub async fn stop(&self, file_key: FileKey) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(PumpMessage::Stop(file_key, done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Write every queued update now.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(PumpMessage::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// Flush outstanding updates and end the task.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "WAL pump task failed");
        }
    }
}

async fn run(engine: Arc<Engine>, mut rx: mpsc::UnboundedReceiver<PumpMessage>) {
    let mut pending: HashMap<FileKey, String> = HashMap::new();
    let mut ticker = interval(engine.config().pump_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(PumpMessage::Update(file_key, content)) => {
                    pending.insert(file_key, content);
                }
                Some(PumpMessage::Stop(file_key, done)) => {
                    pending.remove(&file_key);
                    let engine = Arc::clone(&engine);
                    if let Err(e) = tokio::task::spawn_blocking(move || engine.stop_wal(&file_key)).await {
                        warn!(error = %e, "WAL stop task failed");
                    }
                    let _ = done.send(());
                }
                Some(PumpMessage::Flush(done)) => {
                    flush(&engine, &mut pending).await;
                    let _ = done.send(());
                }
                None => {
                    flush(&engine, &mut pending).await;
                    debug!("WAL pump stopped");
                    return;
                }
            },
            _ = ticker.tick() => flush(&engine, &mut pending).await,
        }
    }
}

async fn flush(engine: &Arc<Engine>, pending: &mut HashMap<FileKey, String>) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    let count = batch.len();
    let engine = Arc::clone(engine);
    let result = tokio::task::spawn_blocking(move || {
        for (file_key, content) in &batch {
            engine.update_wal(file_key, content);
        }
    })
    .await;
    match result {
        Ok(()) => debug!(count, "WAL updates flushed"),
        Err(e) => warn!(error = %e, "WAL flush task failed"),
    }
}
