use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("results can be checked from {opens_at}")]
    ResultsLocked { opens_at: DateTime<Tz> },
    #[error("fixtures were refreshed recently, try again in {}", format_wait(*remaining))]
    RefreshCooldown { remaining: Duration },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl TrackerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        TrackerError::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        TrackerError::Validation(msg.into())
    }
}

pub fn format_wait(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    let mins = (secs + 59) / 60;
    if mins >= 60 {
        format!("{}h {}m", mins / 60, mins % 60)
    } else {
        format!("{mins}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_round_up_to_minutes() {
        assert_eq!(format_wait(Duration::seconds(61)), "2m");
        assert_eq!(format_wait(Duration::seconds(3600)), "1h 0m");
        assert_eq!(format_wait(Duration::seconds(-5)), "0m");
    }
}
