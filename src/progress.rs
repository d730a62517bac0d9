use crate::engine::EngineProgress;

/// Prefix of the lines produced by [`PROGRESS_TEMPLATE`]
pub const PROGRESS_PREFIX: &str = "eternax-progress|";
/// Prefix of the line printed once the file has reached its final place
pub const FILE_PREFIX: &str = "eternax-file|";

/// Value for yt-dlp's `--progress-template`. Filename goes last since it may contain the separator.
pub const PROGRESS_TEMPLATE: &str = "download:eternax-progress|%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.filename)s";

/// Value for yt-dlp's `--print`
pub const FILE_TEMPLATE: &str = "after_move:eternax-file|%(filepath)s";

pub fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    let rest = line.trim_end().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.splitn(6, '|');
    let status = fields.next()?.trim().to_string();
    let downloaded = number(fields.next()?).map(|v| v as u64).unwrap_or(0);
    let total = number(fields.next()?);
    let estimate = number(fields.next()?);
    let speed = number(fields.next()?);
    let filename = fields
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "NA")
        .map(str::to_string);

    Some(EngineProgress {
        status,
        downloaded_bytes: downloaded,
        total_bytes: total.or(estimate).map(|v| v as u64),
        speed,
        filename,
    })
}

pub fn parse_file_line(line: &str) -> Option<&str> {
    let path = line.trim_end().strip_prefix(FILE_PREFIX)?.trim();
    (!path.is_empty() && path != "NA").then_some(path)
}

// yt-dlp prints "NA" for fields it does not know yet, and floats for estimates
fn number(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_progress_line() {
        let p = parse_progress_line(
            "eternax-progress|downloading|500|1000|NA|100.0|/tmp/x.mp4\n",
        )
        .unwrap();
        assert_eq!(p.status, "downloading");
        assert_eq!(p.downloaded_bytes, 500);
        assert_eq!(p.total_bytes, Some(1000));
        assert_eq!(p.speed, Some(100.0));
        assert_eq!(p.filename.as_deref(), Some("/tmp/x.mp4"));
    }

    #[test]
    fn unknown_fields_fall_back() {
        let p = parse_progress_line("eternax-progress|downloading|0|NA|2048.7|NA|NA").unwrap();
        assert_eq!(p.total_bytes, Some(2048));
        assert_eq!(p.speed, None);
        assert_eq!(p.filename, None);

        let p = parse_progress_line("eternax-progress|downloading|NA|NA|NA|NA|a.webm").unwrap();
        assert_eq!(p.downloaded_bytes, 0);
        assert_eq!(p.total_bytes, None);
    }

    #[test]
    fn filename_may_contain_separator() {
        let p = parse_progress_line("eternax-progress|finished|10|10|NA|NA|a|b.mp4").unwrap();
        assert_eq!(p.filename.as_deref(), Some("a|b.mp4"));
    }

    #[test]
    fn other_lines_are_ignored() {
        assert!(parse_progress_line("[download] Destination: x.mp4").is_none());
        assert!(parse_progress_line("eternax-progress|downloading").is_none());
        assert_eq!(parse_file_line("eternax-file|/home/u/clip.mp4"), Some("/home/u/clip.mp4"));
        assert_eq!(parse_file_line("eternax-file|NA"), None);
        assert_eq!(parse_file_line("[Merger] Merging formats"), None);
    }
}
