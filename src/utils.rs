//! Utility functions for release tags and durations

/// Characters that are not allowed in file names on common filesystems
pub const FILENAME_FORBIDDEN: &[char] = &['*', '?', ':', '/', '\\', '"', '<', '>', '|'];

const SECONDS_PER_DAY: u64 = 86_400;

/// Turn a release name into a tag usable as file name
///
/// Spaces become dots, everything from the first `{` on is dropped (that is
/// where `{{password}}` suffixes live) and filesystem-forbidden characters are
/// removed.
///
/// # Examples
///
/// ```
/// use nzb_monkey::utils::release_tag;
///
/// assert_eq!(release_tag(" Some Show S01E02 720p "), "Some.Show.S01E02.720p");
/// assert_eq!(release_tag("Movie 2019{{secret}}"), "Movie.2019");
/// ```
#[must_use]
pub fn release_tag(raw: &str) -> String {
    let trimmed = raw.trim();
    let head = match trimmed.find('{') {
        Some(brace) => &trimmed[..brace],
        None => trimmed,
    };
    head.chars()
        .filter(|c| !FILENAME_FORBIDDEN.contains(c))
        .map(|c| if c == ' ' { '.' } else { c })
        .collect()
}

/// Render a duration in seconds for humans
///
/// Gives `[N day(s) ]HH:MM:SS`, or with `days_only` just `N day(s)` and
/// `< 1 day` below one day. Negative values count as positive and zero as one
/// second.
///
/// # Examples
///
/// ```
/// use nzb_monkey::utils::format_duration;
///
/// assert_eq!(format_duration(3_725, false), "01:02:05");
/// assert_eq!(format_duration(90_061, false), "1 day 01:01:01");
/// assert_eq!(format_duration(200_000, true), "2 days");
/// ```
#[must_use]
pub fn format_duration(seconds: i64, days_only: bool) -> String {
    let seconds = seconds.unsigned_abs().max(1);
    let days = seconds / SECONDS_PER_DAY;
    let rest = seconds % SECONDS_PER_DAY;

    let day_part = match days {
        0 => String::new(),
        1 => "1 day".to_string(),
        n => format!("{n} days"),
    };

    if days_only {
        if days == 0 {
            return "< 1 day".to_string();
        }
        return day_part;
    }

    let clock = format!("{:02}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    if day_part.is_empty() {
        clock
    } else {
        format!("{day_part} {clock}")
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_tag_replaces_spaces_and_trims() {
        assert_eq!(release_tag("  A Release Name  "), "A.Release.Name");
    }

    #[test]
    fn release_tag_cuts_at_first_brace() {
        assert_eq!(release_tag("Name{{pw}}"), "Name");
        assert_eq!(release_tag("{only braces}"), "");
    }

    #[test]
    fn release_tag_strips_forbidden_characters() {
        assert_eq!(release_tag(r#"What? A: "Show"/Part|1"#), "What.A.ShowPart1");
    }

    #[test]
    fn format_duration_below_one_day() {
        assert_eq!(format_duration(59, false), "00:00:59");
        assert_eq!(format_duration(3_600, false), "01:00:00");
    }

    #[test]
    fn format_duration_zero_counts_as_one_second() {
        assert_eq!(format_duration(0, false), "00:00:01");
    }

    #[test]
    fn format_duration_negative_is_absolute() {
        assert_eq!(format_duration(-61, false), "00:01:01");
    }

    #[test]
    fn format_duration_days_only() {
        assert_eq!(format_duration(100, true), "< 1 day");
        assert_eq!(format_duration(86_400, true), "1 day");
        assert_eq!(format_duration(3 * 86_400 + 5, true), "3 days");
    }

    #[test]
    fn format_duration_with_days_and_clock() {
        assert_eq!(format_duration(2 * 86_400 + 3_661, false), "2 days 01:01:01");
    }
}
