use std::path::PathBuf;

use thiserror::Error;

/// Why a submission was refused. Nothing is queued when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please enter a valid URL, custom filename, and select a file format (missing {0}).")]
    MissingField(&'static str),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Unsupported video quality: {0}")]
    InvalidQuality(String),

    #[error("Only 'Auto' quality is allowed for MP3 format.")]
    AudioQualityConflict,
}

/// Failure raised by the download engine while resolving or transferring media
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start yt-dlp: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yt-dlp exited with code {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("yt-dlp did not report where it saved the file")]
    MissingOutput,

    #[error("yt-dlp {0} was not captured")]
    MissingPipe(&'static str),

    #[error("could not read yt-dlp output: {0}")]
    Json(#[from] serde_json::Error),
}

/// The quality list for a URL could not be fetched
#[derive(Debug, Error)]
#[error("Failed to fetch quality list: {0}")]
pub struct QualityFetchError(#[from] pub EngineError);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_pipe_is_not_reported_as_missing_file() {
        let err = EngineError::MissingPipe("stdout");
        assert_eq!(err.to_string(), "yt-dlp stdout was not captured");
        assert_ne!(err.to_string(), EngineError::MissingOutput.to_string());
    }

    #[test]
    fn quality_fetch_error_wraps_engine_message() {
        let err = QualityFetchError::from(EngineError::Failed {
            code: Some(1),
            stderr: "ERROR: Unsupported URL".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Failed to fetch quality list: yt-dlp exited with code Some(1): ERROR: Unsupported URL"
        );
    }
}
