use std::{fmt, path::PathBuf, str::FromStr};

use crate::error::ValidationError;
use crate::units::{IDLE_RATE, format_size};

/// Container the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    /// Video with audio, offered as "MP4"
    Video,
    /// Audio only, offered as "MP3"
    Audio,
}

impl MediaFormat {
    /// Every format in the order the form lists them
    pub const ALL: [MediaFormat; 2] = [MediaFormat::Video, MediaFormat::Audio];

    pub fn label(self) -> &'static str {
        match self {
            MediaFormat::Video => "MP4",
            MediaFormat::Audio => "MP3",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MediaFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(ValidationError::MissingField("format")),
            s if s.eq_ignore_ascii_case("mp4") => Ok(MediaFormat::Video),
            s if s.eq_ignore_ascii_case("mp3") => Ok(MediaFormat::Audio),
            other => Err(ValidationError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Upper bound on the vertical resolution of the downloaded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Whatever the engine considers best
    Auto,
    /// Best stream whose height is at most this many pixels
    MaxHeight(u32),
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Auto => f.write_str("Auto"),
            Quality::MaxHeight(h) => write!(f, "{h}p"),
        }
    }
}

impl FromStr for Quality {
    type Err = ValidationError;

    /// Accepts "Auto", "720" or "720p". Only the first word counts, so
    /// combo labels such as "720p (HD)" parse too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.split_whitespace().next().unwrap_or("");
        if word.is_empty() {
            return Err(ValidationError::MissingField("quality"));
        }
        if word.eq_ignore_ascii_case("auto") {
            return Ok(Quality::Auto);
        }
        let digits = word.strip_suffix(['p', 'P']).unwrap_or(word);
        match digits.parse::<u32>() {
            Ok(h) if h > 0 => Ok(Quality::MaxHeight(h)),
            _ => Err(ValidationError::InvalidQuality(s.trim().to_string())),
        }
    }
}

/// One validated download request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Page or media URL handed to the engine
    pub url: String,
    /// Requested container
    pub format: MediaFormat,
    /// Resolution ceiling
    pub quality: Quality,
    /// Directory the file lands in
    pub destination: PathBuf,
    /// Base name of the output file, without extension
    pub filename: String,
}

impl Task {
    pub fn new(
        url: impl Into<String>,
        format: MediaFormat,
        quality: Quality,
        destination: impl Into<PathBuf>,
        filename: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let task = Self {
            url: url.into(),
            format,
            quality,
            destination: destination.into(),
            filename: filename.into(),
        };
        task.check()?;
        Ok(task)
    }

    /// Re-checks the invariants a task must hold before a worker may run it.
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::MissingField("URL"));
        }
        if self.filename.trim().is_empty() {
            return Err(ValidationError::MissingField("filename"));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(ValidationError::MissingField("save location"));
        }
        if self.format == MediaFormat::Audio && self.quality != Quality::Auto {
            return Err(ValidationError::AudioQualityConflict);
        }
        Ok(())
    }

    /// Final location of the file once the engine has settled on an extension.
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.destination.join(format!("{}.{}", self.filename, extension))
    }
}

/// Raw contents of the "Add to Queue" form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub filename: String,
    /// "MP4" or "MP3"
    pub format: String,
    /// "Auto" or a height such as "720p"
    pub quality: String,
    pub destination: String,
}

impl Submission {
    /// Turns the form into a task, or explains what is wrong with it.
    pub fn validate(&self) -> Result<Task, ValidationError> {
        let url = required("URL", &self.url)?;
        let filename = required("filename", &self.filename)?;
        let format: MediaFormat = self.format.parse()?;
        let quality: Quality = self.quality.parse()?;
        let destination = required("save location", &self.destination)?;
        Task::new(url, format, quality, destination, filename)
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(value)
    }
}

/// Lifecycle stage of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Waiting,
    Downloading,
    Completed,
    Error,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Waiting => "Waiting",
            Status::Downloading => "Downloading",
            Status::Completed => "Completed",
            Status::Error => "Error",
        }
    }

    /// No event follows a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Error)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display name used for rows whose download failed
pub const ERROR_NAME: &str = "Error";

/// Update emitted by a worker about its task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Resolved filename, or a placeholder
    pub name: String,
    pub status: Status,
    /// Bytes transferred so far
    pub downloaded: u64,
    /// Expected size; 0 while the engine does not know it
    pub total: u64,
    /// Human readable transfer rate, e.g. "1.20 MB/s"
    pub rate: String,
}

impl ProgressEvent {
    pub fn downloading(name: impl Into<String>, downloaded: u64, total: u64, rate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Downloading,
            downloaded,
            total,
            rate: rate.into(),
        }
    }

    pub fn completed(path: impl Into<String>, size: u64) -> Self {
        Self {
            name: path.into(),
            status: Status::Completed,
            downloaded: size,
            total: size,
            rate: IDLE_RATE.to_string(),
        }
    }

    pub fn failed() -> Self {
        Self {
            name: ERROR_NAME.to_string(),
            status: Status::Error,
            downloaded: 0,
            total: 0,
            rate: IDLE_RATE.to_string(),
        }
    }
}

/// Background colour of a row's name cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Neutral,
    Success,
    Failure,
}

/// Position of a row in the queue; rows are never removed so it stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle(pub(crate) usize);

impl RowHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What the queue table shows for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    pub name: String,
    pub status: Status,
    pub rate: String,
    pub size: String,
    pub marker: Marker,
}

impl QueueRow {
    /// Placeholder shown until the worker reports anything
    pub fn pending() -> Self {
        Self {
            name: "Pending...".to_string(),
            status: Status::Waiting,
            rate: IDLE_RATE.to_string(),
            size: format_size(0),
            marker: Marker::Neutral,
        }
    }

    /// Overwrites every displayed field from a single event.
    pub fn apply(&mut self, event: &ProgressEvent) {
        if event.status == Status::Error {
            self.name = ERROR_NAME.to_string();
            self.marker = Marker::Failure;
        } else {
            self.name = event.name.clone();
            self.marker = Marker::Success;
        }
        self.status = event.status;
        self.rate = event.rate.clone();
        self.size = format_size(event.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(format: &str, quality: &str) -> Submission {
        Submission {
            url: "https://www.youtube.com/watch?v=abc".into(),
            filename: "clip".into(),
            format: format.into(),
            quality: quality.into(),
            destination: "/tmp/videos".into(),
        }
    }

    #[test]
    fn valid_form_becomes_task() {
        let task = form("MP4", "720p").validate().unwrap();
        assert_eq!(task.format, MediaFormat::Video);
        assert_eq!(task.quality, Quality::MaxHeight(720));
        assert_eq!(task.destination, PathBuf::from("/tmp/videos"));
        assert_eq!(task.output_path("webm"), PathBuf::from("/tmp/videos/clip.webm"));
    }

    #[test]
    fn mp3_only_allows_auto() {
        assert_eq!(
            form("MP3", "1080p").validate(),
            Err(ValidationError::AudioQualityConflict)
        );
        assert!(form("MP3", "Auto").validate().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut f = form("MP4", "Auto");
        f.url = "   ".into();
        assert_eq!(f.validate(), Err(ValidationError::MissingField("URL")));

        let mut f = form("MP4", "Auto");
        f.filename.clear();
        assert_eq!(f.validate(), Err(ValidationError::MissingField("filename")));

        let mut f = form("MP4", "Auto");
        f.destination.clear();
        assert_eq!(f.validate(), Err(ValidationError::MissingField("save location")));

        assert_eq!(form("", "Auto").validate(), Err(ValidationError::MissingField("format")));
        assert_eq!(form("MP4", "").validate(), Err(ValidationError::MissingField("quality")));
    }

    #[test]
    fn quality_labels() {
        assert_eq!("Auto".parse::<Quality>(), Ok(Quality::Auto));
        assert_eq!("480".parse::<Quality>(), Ok(Quality::MaxHeight(480)));
        assert_eq!("1080p (FHD)".parse::<Quality>(), Ok(Quality::MaxHeight(1080)));
        assert!(matches!("0p".parse::<Quality>(), Err(ValidationError::InvalidQuality(_))));
        assert!(matches!("hd".parse::<Quality>(), Err(ValidationError::InvalidQuality(_))));
        assert_eq!(Quality::MaxHeight(360).to_string(), "360p");
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert_eq!(
            form("AVI", "Auto").validate(),
            Err(ValidationError::UnsupportedFormat("AVI".into()))
        );
    }

    #[test]
    fn error_event_marks_row_failed() {
        let mut row = QueueRow::pending();
        row.apply(&ProgressEvent::failed());
        assert_eq!(row.name, "Error");
        assert_eq!(row.marker, Marker::Failure);
        assert_eq!(row.size, "0 Bytes");
        assert_eq!(row.rate, "0 KB/s");
    }
}
