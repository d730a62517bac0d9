//! Download queue: one row per submitted task, updated from worker events.
//!
//! Workers never touch rows. They send [`WorkerMessage`]s over a bounded
//! channel and the queue, as the only writer, applies each message to its
//! row in one step. Messages from one worker arrive in the order sent;
//! there is no ordering between workers.

use std::sync::Arc;

use tokio::{
    runtime::Handle,
    sync::mpsc::{self, Receiver, Sender},
};
use tracing::{info, warn};

use crate::downloader::{WorkerMessage, run_worker};
use crate::engine::DownloadEngine;
use crate::error::ValidationError;
use crate::model::{ProgressEvent, QueueRow, RowHandle, Submission, Task};

pub struct Queue {
    rows: Vec<QueueRow>,
    engine: Arc<dyn DownloadEngine>,
    runtime: Handle,
    events_tx: Sender<WorkerMessage>,
    events_rx: Receiver<WorkerMessage>,
}

impl Queue {
    /// `buffer` bounds the number of undelivered events; workers wait when it is full.
    pub fn new(engine: Arc<dyn DownloadEngine>, runtime: Handle, buffer: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(buffer.max(1));
        Self {
            rows: Vec::new(),
            engine,
            runtime,
            events_tx,
            events_rx,
        }
    }

    /// Validates the form and, if it holds up, queues the task.
    pub fn submit(&mut self, submission: &Submission) -> Result<RowHandle, ValidationError> {
        let task = submission.validate()?;
        self.submit_task(task)
    }

    /// Appends a waiting row and starts a worker for it.
    pub fn submit_task(&mut self, task: Task) -> Result<RowHandle, ValidationError> {
        task.check()?;
        let handle = RowHandle(self.rows.len());
        self.rows.push(QueueRow::pending());
        info!(row = handle.index(), url = %task.url, dest = %task.destination.display(), "queued download");

        self.runtime.spawn(run_worker(
            Arc::clone(&self.engine),
            task,
            handle,
            self.events_tx.clone(),
        ));
        Ok(handle)
    }

    /// Applies one event to the row it belongs to.
    pub fn on_progress(&mut self, handle: RowHandle, event: &ProgressEvent) {
        match self.rows.get_mut(handle.index()) {
            Some(row) => row.apply(event),
            None => warn!(row = handle.index(), "event for unknown row dropped"),
        }
    }

    /// Applies every event that has already arrived, without waiting.
    /// Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.events_rx.try_recv() {
            self.on_progress(msg.handle, &msg.event);
            applied += 1;
        }
        applied
    }

    /// Waits until every row has reached a terminal status.
    #[cfg(test)]
    pub async fn settle(&mut self) {
        while self.active_count() > 0 {
            match self.events_rx.recv().await {
                Some(msg) => self.on_progress(msg.handle, &msg.event),
                None => break,
            }
        }
    }

    pub fn rows(&self) -> &[QueueRow] {
        &self.rows
    }

    #[cfg(test)]
    pub fn row(&self, handle: RowHandle) -> Option<&QueueRow> {
        self.rows.get(handle.index())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose worker has not reported a terminal status yet
    pub fn active_count(&self) -> usize {
        self.rows.iter().filter(|row| !row.status.is_terminal()).count()
    }
}
