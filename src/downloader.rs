use std::sync::Arc;

use tokio::sync::mpsc::{self, Sender};
use tracing::{debug, error, info};

use crate::engine::{DownloadEngine, EngineOutput, EngineProgress, EngineRequest};
use crate::error::EngineError;
use crate::model::{MediaFormat, ProgressEvent, Quality, RowHandle, Task};
use crate::units::format_rate;

/// Event addressed to the row a worker was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerMessage {
    pub handle: RowHandle,
    pub event: ProgressEvent,
}

/// yt-dlp format selector for a quality ceiling.
pub fn format_selector(quality: Quality) -> String {
    match quality {
        Quality::Auto => "best".to_string(),
        Quality::MaxHeight(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
    }
}

pub fn engine_request(task: &Task) -> EngineRequest {
    EngineRequest {
        url: task.url.clone(),
        selector: format_selector(task.quality),
        output_template: task.destination.join(format!("{}.%(ext)s", task.filename)),
        extract_audio: task.format == MediaFormat::Audio,
    }
}

/// Maps an engine report to a row update. Only "downloading" reports count.
pub fn downloading_event(report: &EngineProgress) -> Option<ProgressEvent> {
    if report.status != "downloading" {
        return None;
    }
    Some(ProgressEvent::downloading(
        report.filename.as_deref().unwrap_or("Unknown"),
        report.downloaded_bytes,
        report.total_bytes.unwrap_or(0),
        format_rate(report.speed),
    ))
}

struct Reporter {
    handle: RowHandle,
    events: Sender<WorkerMessage>,
}

impl Reporter {
    /// Returns false once the queue has gone away.
    async fn send(&self, event: ProgressEvent) -> bool {
        self.events
            .send(WorkerMessage {
                handle: self.handle,
                event,
            })
            .await
            .is_ok()
    }
}

/// Runs one task to completion or failure, reporting to `events`.
///
/// Every engine report is relayed before the single terminal event, which
/// is the last message this worker sends. Engine errors end here: they are
/// logged and become an `Error` event without detail.
pub async fn run_worker(
    engine: Arc<dyn DownloadEngine>,
    task: Task,
    handle: RowHandle,
    events: Sender<WorkerMessage>,
) {
    let reporter = Reporter { handle, events };
    info!(url = %task.url, format = %task.format, quality = %task.quality, "download started");

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let download = engine.download(engine_request(&task), progress_tx);
    let reporter_ref = &reporter;
    let relay = async move {
        while let Some(report) = progress_rx.recv().await {
            if let Some(event) = downloading_event(&report) {
                if !reporter_ref.send(event).await {
                    break;
                }
            }
        }
    };
    let (result, ()) = tokio::join!(download, relay);

    let terminal = match finish(&task, result).await {
        Ok((path, size)) => {
            info!(url = %task.url, path = %path, size, "download completed");
            ProgressEvent::completed(path, size)
        }
        Err(err) => {
            error!(url = %task.url, "download failed: {err}");
            ProgressEvent::failed()
        }
    };
    reporter.send(terminal).await;
}

async fn finish(
    task: &Task,
    result: Result<EngineOutput, EngineError>,
) -> Result<(String, u64), EngineError> {
    let output = result?;
    let path = task.output_path(&output.extension);
    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) => meta.len(),
        // yt-dlp may have sanitized the filename; fall back to the path it printed
        Err(err) if output.final_path != path => {
            debug!(reported = %output.final_path.display(), expected = %path.display(), "{err}; using reported path");
            let size = tokio::fs::metadata(&output.final_path).await?.len();
            return Ok((output.final_path.display().to_string(), size));
        }
        Err(err) => return Err(err.into()),
    };
    Ok((path.display().to_string(), size))
}
