//! The external download engine and its yt-dlp implementation.

use std::{
    collections::{BTreeSet, VecDeque},
    ffi::OsString,
    path::PathBuf,
    process::Stdio,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::progress::{FILE_TEMPLATE, PROGRESS_TEMPLATE, parse_file_line, parse_progress_line};

/// How many trailing stderr lines are kept for the error message
const STDERR_TAIL: usize = 8;

/// What the engine should fetch and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub url: String,
    /// yt-dlp format selector, e.g. `bestvideo[height<=720]+bestaudio/best[height<=720]`
    pub selector: String,
    /// Output path whose extension is left to the engine (`%(ext)s`)
    pub output_template: PathBuf,
    /// Convert the result to MP3
    pub extract_audio: bool,
}

/// Raw progress report, as the engine sees it
#[derive(Debug, Clone, PartialEq)]
pub struct EngineProgress {
    /// "downloading", "finished", "error", ...
    pub status: String,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    /// Bytes per second
    pub speed: Option<f64>,
    pub filename: Option<String>,
}

/// Where the finished file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub final_path: PathBuf,
    /// Extension chosen by the engine for the resolved stream
    pub extension: String,
}

#[async_trait]
pub trait DownloadEngine: Send + Sync {
    /// Fetches the request to disk. Progress reports go to `progress` in
    /// the order the engine produces them; the sender is dropped when
    /// the download ends.
    async fn download(
        &self,
        request: EngineRequest,
        progress: UnboundedSender<EngineProgress>,
    ) -> Result<EngineOutput, EngineError>;

    /// Distinct video heights offered for `url`, highest first.
    async fn list_qualities(&self, url: &str) -> Result<Vec<u32>, EngineError>;
}

/// Drives the `yt-dlp` executable as a child process
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(0x0800_0000); // CREATE_NO_WINDOW
        cmd
    }
}

/// Command line for one download, URL last.
pub fn download_args(request: &EngineRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-f".into(),
        request.selector.clone().into(),
        "--no-playlist".into(),
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "--print".into(),
        FILE_TEMPLATE.into(),
    ];
    if request.extract_audio {
        args.extend(["-x".into(), "--audio-format".into(), "mp3".into()]);
    }
    args.push("-o".into());
    args.push(request.output_template.clone().into_os_string());
    args.push(request.url.clone().into());
    args
}

#[async_trait]
impl DownloadEngine for YtDlp {
    async fn download(
        &self,
        request: EngineRequest,
        progress: UnboundedSender<EngineProgress>,
    ) -> Result<EngineOutput, EngineError> {
        let args = download_args(&request);
        debug!(program = %self.program.display(), ?args, "spawning yt-dlp");

        let mut child = self.command().args(&args).spawn().map_err(EngineError::Spawn)?;
        let stdout = child.stdout.take().ok_or(EngineError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(EngineError::MissingPipe("stderr"))?;

        // With --print in effect yt-dlp may route progress to stderr, so both are scanned
        let stderr_task = tokio::spawn(scan_stderr(stderr, progress.clone()));

        let mut final_path = None;
        let mut stdout = BufReader::new(stdout);
        let mut buf = Vec::new();
        while let Some(line) = next_line_lossy(&mut stdout, &mut buf).await? {
            if let Some(report) = parse_progress_line(&line) {
                let _ = progress.send(report);
            } else if let Some(path) = parse_file_line(&line) {
                final_path = Some(PathBuf::from(path));
            } else {
                debug!("yt-dlp> {}", line);
            }
        }
        drop(progress);

        let status = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(EngineError::Failed {
                code: status.code(),
                stderr: stderr_tail,
            });
        }

        let final_path = final_path.ok_or(EngineError::MissingOutput)?;
        let extension = final_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_string)
            .ok_or(EngineError::MissingOutput)?;
        info!(path = %final_path.display(), "yt-dlp finished");
        Ok(EngineOutput {
            final_path,
            extension,
        })
    }

    async fn list_qualities(&self, url: &str) -> Result<Vec<u32>, EngineError> {
        let output = self
            .command()
            .args(["-J", "--no-playlist", "--no-warnings", url])
            .output()
            .await
            .map_err(EngineError::Spawn)?;
        if !output.status.success() {
            return Err(EngineError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_qualities(&output.stdout)
    }
}

async fn scan_stderr(
    stderr: impl AsyncRead + Unpin,
    progress: UnboundedSender<EngineProgress>,
) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    let mut stderr = BufReader::new(stderr);
    let mut buf = Vec::new();
    // Drained to EOF so yt-dlp never writes into a closed pipe
    while let Ok(Some(line)) = next_line_lossy(&mut stderr, &mut buf).await {
        if let Some(report) = parse_progress_line(&line) {
            let _ = progress.send(report);
            continue;
        }
        debug!("yt-dlp! {}", line);
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    Vec::from(tail).join("\n")
}

/// Reads one line, replacing bytes that are not UTF-8. yt-dlp writes in the
/// console code page on Windows, and titles or filenames may not be UTF-8.
async fn next_line_lossy(
    reader: &mut (impl AsyncBufRead + Unpin),
    buf: &mut Vec<u8>,
) -> io::Result<Option<String>> {
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

#[derive(Deserialize)]
struct VideoInfo {
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Deserialize)]
struct FormatInfo {
    #[serde(default)]
    height: Option<u32>,
}

/// Extracts the distinct heights from `yt-dlp -J` output, highest first.
pub fn parse_qualities(json: &[u8]) -> Result<Vec<u32>, EngineError> {
    let info: VideoInfo = serde_json::from_slice(json)?;
    let heights: BTreeSet<u32> = info
        .formats
        .iter()
        .filter_map(|f| f.height)
        .filter(|h| *h > 0)
        .collect();
    Ok(heights.into_iter().rev().collect())
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted engine for exercising workers and the queue without yt-dlp.

    use std::{collections::HashMap, sync::Mutex, time::Duration};

    use super::*;

    pub enum Outcome {
        /// Write a file of `size` bytes with this extension
        Complete { extension: &'static str, size: usize },
        Fail,
    }

    pub struct Script {
        pub progress: Vec<EngineProgress>,
        pub outcome: Outcome,
    }

    #[derive(Default)]
    pub struct ScriptedEngine {
        scripts: Mutex<HashMap<String, Script>>,
        qualities: Mutex<Option<Vec<u32>>>,
    }

    pub fn downloading(downloaded: u64, total: Option<u64>, speed: Option<f64>, filename: &str) -> EngineProgress {
        EngineProgress {
            status: "downloading".to_string(),
            downloaded_bytes: downloaded,
            total_bytes: total,
            speed,
            filename: Some(filename.to_string()),
        }
    }

    impl ScriptedEngine {
        pub fn with(self, url: &str, script: Script) -> Self {
            self.scripts.lock().unwrap().insert(url.to_string(), script);
            self
        }

        pub fn with_qualities(self, heights: Vec<u32>) -> Self {
            *self.qualities.lock().unwrap() = Some(heights);
            self
        }
    }

    #[async_trait]
    impl DownloadEngine for ScriptedEngine {
        async fn download(
            &self,
            request: EngineRequest,
            progress: UnboundedSender<EngineProgress>,
        ) -> Result<EngineOutput, EngineError> {
            let script = self.scripts.lock().unwrap().remove(&request.url);
            let Some(script) = script else {
                return Err(EngineError::Failed {
                    code: Some(1),
                    stderr: format!("ERROR: Unsupported URL: {}", request.url),
                });
            };
            for report in script.progress {
                let _ = progress.send(report);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            match script.outcome {
                Outcome::Complete { extension, size } => {
                    let template = request.output_template.to_string_lossy().into_owned();
                    let final_path = PathBuf::from(template.replace("%(ext)s", extension));
                    tokio::fs::write(&final_path, vec![0u8; size]).await?;
                    Ok(EngineOutput {
                        final_path,
                        extension: extension.to_string(),
                    })
                }
                Outcome::Fail => Err(EngineError::Failed {
                    code: Some(1),
                    stderr: "ERROR: Unable to download webpage".to_string(),
                }),
            }
        }

        async fn list_qualities(&self, url: &str) -> Result<Vec<u32>, EngineError> {
            self.qualities.lock().unwrap().clone().ok_or_else(|| EngineError::Failed {
                code: Some(1),
                stderr: format!("ERROR: no formats for {url}"),
            })
        }
    }
}
