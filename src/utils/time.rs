use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

/// Sortable textual timestamp form used in the activity log and the cli.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Renders a duration as `H:MM:SS` for report output.
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn timestamp_round_trip() {
        let time = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(9, 30, 5)
                .unwrap(),
        );
        assert_eq!(format_timestamp(time), "2024-03-15 09:30:05");
        assert_eq!(parse_timestamp("2024-03-15 09:30:05").unwrap(), time);
    }

    #[test]
    fn durations_render_with_hours_unpadded() {
        assert_eq!(format_duration(Duration::seconds(3905)), "1:05:05");
        assert_eq!(format_duration(Duration::seconds(59)), "0:00:59");
    }
}
