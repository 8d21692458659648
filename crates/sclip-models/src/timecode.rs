//! Timestamp conversion between mm:ss strings, seconds, and HH:MM:SS.
//!
//! The summarizer reports event times as `M:SS` / `MM:SS` relative to the
//! segment start; ffmpeg takes `HH:MM:SS` for `-ss` and `-t`.

use thiserror::Error;

/// Timestamp parsing error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimecodeError {
    #[error("invalid mm:ss timestamp '{0}'")]
    InvalidFormat(String),

    #[error("invalid {component} value '{value}'")]
    InvalidValue {
        component: &'static str,
        value: String,
    },
}

/// Parse a `M:SS` or `MM:SS` timestamp into whole seconds.
///
/// # Examples
/// ```
/// use sclip_models::timecode::parse_mmss;
/// assert_eq!(parse_mmss("0:10").unwrap(), 10);
/// assert_eq!(parse_mmss("12:34").unwrap(), 754);
/// ```
pub fn parse_mmss(ts: &str) -> Result<u32, TimecodeError> {
    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() != 2 {
        return Err(TimecodeError::InvalidFormat(ts.to_string()));
    }

    let minutes: u32 = parts[0].parse().map_err(|_| TimecodeError::InvalidValue {
        component: "minutes",
        value: parts[0].to_string(),
    })?;
    let seconds: u32 = parts[1].parse().map_err(|_| TimecodeError::InvalidValue {
        component: "seconds",
        value: parts[1].to_string(),
    })?;

    Ok(minutes * 60 + seconds)
}

/// Format seconds as `HH:MM:SS`, flooring to whole seconds.
pub fn format_hhmmss(total_secs: f64) -> String {
    let total = total_secs.max(0.0).floor() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mmss() {
        assert_eq!(parse_mmss("0:00").unwrap(), 0);
        assert_eq!(parse_mmss("0:16").unwrap(), 16);
        assert_eq!(parse_mmss("2:13").unwrap(), 133);
        assert_eq!(parse_mmss("59:59").unwrap(), 3599);
    }

    #[test]
    fn test_parse_mmss_rejects_bad_shapes() {
        assert!(matches!(
            parse_mmss("123"),
            Err(TimecodeError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_mmss("1:2:3"),
            Err(TimecodeError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_mmss(""),
            Err(TimecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_mmss_rejects_bad_values() {
        assert!(matches!(
            parse_mmss("1:2x"),
            Err(TimecodeError::InvalidValue {
                component: "seconds",
                ..
            })
        ));
        assert!(matches!(
            parse_mmss("x:20"),
            Err(TimecodeError::InvalidValue {
                component: "minutes",
                ..
            })
        ));
        assert!(matches!(
            parse_mmss("-1:20"),
            Err(TimecodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_format_hhmmss() {
        assert_eq!(format_hhmmss(0.0), "00:00:00");
        assert_eq!(format_hhmmss(90.0), "00:01:30");
        assert_eq!(format_hhmmss(3661.0), "01:01:01");
        assert_eq!(format_hhmmss(119.9), "00:01:59");
        assert_eq!(format_hhmmss(-5.0), "00:00:00");
    }
}
