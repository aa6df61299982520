//! Time utilities for opkssh-renewer

use std::time::{Duration, SystemTime};

/// Time elapsed since `earlier`.
///
/// Returns Duration::ZERO if `earlier` is in the future, which happens
/// when a file's modification time is ahead of the local clock.
pub fn elapsed_since(earlier: SystemTime) -> Duration {
    SystemTime::now()
        .duration_since(earlier)
        .unwrap_or(Duration::ZERO)
}

/// Format a duration as zero-padded hours and minutes, e.g. `05h07m`.
///
/// Seconds are truncated. Hours are not capped at 24.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use opk_core::time::format_hm;
///
/// assert_eq!(format_hm(Duration::from_secs(3 * 3600 + 65)), "03h01m");
/// ```
pub fn format_hm(duration: Duration) -> String {
    let total_minutes = duration.as_secs() / 60;
    format!("{:02}h{:02}m", total_minutes / 60, total_minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_since_past() {
        let earlier = SystemTime::now() - Duration::from_secs(90);
        let elapsed = elapsed_since(earlier);
        assert!(elapsed >= Duration::from_secs(90));
    }

    #[test]
    fn test_elapsed_since_future_time() {
        let future = SystemTime::now() + Duration::from_secs(1000);
        assert_eq!(elapsed_since(future), Duration::ZERO);
    }

    #[test]
    fn test_format_hm() {
        assert_eq!(format_hm(Duration::ZERO), "00h00m");
        assert_eq!(format_hm(Duration::from_secs(59)), "00h00m");
        assert_eq!(format_hm(Duration::from_secs(23 * 3600 + 59 * 60)), "23h59m");
        assert_eq!(format_hm(Duration::from_secs(100 * 3600)), "100h00m");
    }
}
