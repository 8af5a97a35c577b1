//! Run planning: merge defaulting and the large-range notice.

/// Candidate-date count above which the CLI prints a duration estimate.
pub const LARGE_RANGE_THRESHOLD: usize = 100;

/// Rough wall time per date, network round trip included.
pub const SECONDS_PER_DATE: f64 = 0.25;

/// A single-date request always goes through the merged path.
pub fn effective_merge(requested: bool, date_count: usize) -> bool {
    requested || date_count == 1
}

/// `45s`, `2 min`, `2.0 hr`.
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        format!("{}s", seconds as u64)
    } else if seconds < 3600.0 {
        format!("{} min", (seconds / 60.0) as u64)
    } else {
        format!("{:.1} hr", seconds / 3600.0)
    }
}

/// Notice for ranges larger than [`LARGE_RANGE_THRESHOLD`], `None` otherwise.
pub fn large_range_notice(date_count: usize) -> Option<String> {
    if date_count <= LARGE_RANGE_THRESHOLD {
        return None;
    }
    let estimate = format_duration(date_count as f64 * SECONDS_PER_DATE);
    Some(format!(
        "Note: {date_count} candidate dates, estimated ~{estimate}. \
         Exchange holidays are skipped automatically as not found."
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_under_a_minute_are_seconds() {
        assert_eq!(format_duration(45.0), "45s");
    }

    #[test]
    fn durations_in_minutes_round_down() {
        assert_eq!(format_duration(60.0), "1 min");
        assert_eq!(format_duration(90.0), "1 min");
        assert_eq!(format_duration(3599.0), "59 min");
    }

    #[test]
    fn durations_in_hours_have_one_decimal() {
        assert_eq!(format_duration(7200.0), "2.0 hr");
    }

    #[test]
    fn no_notice_up_to_threshold() {
        assert_eq!(large_range_notice(LARGE_RANGE_THRESHOLD - 1), None);
        assert_eq!(large_range_notice(LARGE_RANGE_THRESHOLD), None);
    }

    #[test]
    fn notice_above_threshold_mentions_count_estimate_and_holidays() {
        let notice = large_range_notice(LARGE_RANGE_THRESHOLD + 1).unwrap();
        assert!(notice.contains("Note"));
        assert!(notice.contains(&(LARGE_RANGE_THRESHOLD + 1).to_string()));
        assert!(notice.to_lowercase().contains("holiday"));

        // 500 × 0.25s = 125s
        assert!(large_range_notice(500).unwrap().contains("2 min"));
    }

    #[test]
    fn single_date_forces_merge() {
        assert!(effective_merge(false, 1));
        assert!(!effective_merge(false, 5));
        assert!(effective_merge(true, 5));
    }
}
