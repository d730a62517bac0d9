/// Rate label shown whenever no transfer is happening
pub const IDLE_RATE: &str = "0 KB/s";

/// Formats a byte count with decimal (1000-based) units and two decimals.
pub fn format_size(bytes: u64) -> String {
    let value = bytes as f64;
    if bytes >= 1_000_000_000 {
        format!("{:.2} GB", value / 1_000_000_000.0)
    } else if bytes >= 1_000_000 {
        format!("{:.2} MB", value / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.2} KB", value / 1_000.0)
    } else {
        format!("{bytes} Bytes")
    }
}

/// Formats a transfer speed in bytes per second. Unknown or zero speed
/// yields [`IDLE_RATE`].
pub fn format_rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed.is_finite() && speed >= 1.0 => {
            format!("{}/s", format_size(speed as u64))
        }
        _ => IDLE_RATE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(999), "999 Bytes");
        assert_eq!(format_size(1000), "1.00 KB");
        assert_eq!(format_size(1_500_000), "1.50 MB");
        assert_eq!(format_size(999_999_999), "1000.00 MB");
        assert_eq!(format_size(2_000_000_000), "2.00 GB");
    }

    #[test]
    fn unit_never_shrinks_as_size_grows() {
        let rank = |s: &str| match s.rsplit(' ').next() {
            Some("Bytes") => 0,
            Some("KB") => 1,
            Some("MB") => 2,
            Some("GB") => 3,
            other => panic!("unexpected unit {other:?}"),
        };
        let mut last = 0;
        let mut b = 1u64;
        while b < 50_000_000_000 {
            let r = rank(&format_size(b));
            assert!(r >= last, "{b} went from rank {last} to {r}");
            last = r;
            b = b * 3 + 7;
        }
    }

    #[test]
    fn rates() {
        assert_eq!(format_rate(None), "0 KB/s");
        assert_eq!(format_rate(Some(0.0)), "0 KB/s");
        assert_eq!(format_rate(Some(100.0)), "100 Bytes/s");
        assert_eq!(format_rate(Some(2_345_678.9)), "2.35 MB/s");
    }
}
