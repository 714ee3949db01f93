use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::{format_timestamp, parse_timestamp};

/// Classifier sentinel for a user who crossed the idle threshold.
pub const IDLE_NAME: &str = "Idle";
/// Label an idle period gets when the user chooses to log it as a break.
pub const BREAK_NAME: &str = "Break";
/// Classifier sentinel for an empty or missing window title.
pub const NO_WINDOW_NAME: &str = "Idle/No Window";

/// A closed, persisted unit of tracked time.
///
/// Identity for later mutation is `start_time` within a one second tolerance,
/// matching the original log format which carries no surrogate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub app_name: Arc<str>,
    #[serde(with = "timestamp_ser")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "timestamp_ser")]
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    /// Comma-joined labels, no escaping. Tags containing a literal comma are
    /// indistinguishable from multiple tags (known limitation of the format).
    #[serde(default)]
    pub tags: String,
}

impl Activity {
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }

    /// True for everything except the `Idle`/`Break` sentinels.
    pub fn is_real(&self) -> bool {
        self.app_name.as_ref() != IDLE_NAME && self.app_name.as_ref() != BREAK_NAME
    }

    pub fn set_end(&mut self, end: DateTime<Utc>) {
        self.end_time = end;
        self.duration_seconds = (end - self.start_time).num_seconds();
    }

    /// Restricts the activity to `[from, to)`. Returns `None` if it lies
    /// entirely outside the range.
    pub fn clamp(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Option<Activity> {
        if self.end_time <= from || self.start_time >= to {
            return None;
        }
        if self.start_time < from {
            self.start_time = from;
        }
        if self.end_time > to {
            self.end_time = to;
        }
        self.duration_seconds = (self.end_time - self.start_time).num_seconds();
        Some(self)
    }

    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.app_name,
            format_timestamp(self.start_time),
            format_timestamp(self.end_time),
            self.duration_seconds,
            self.tags
        )
    }

    /// Parses one log row. The first four columns cannot contain commas, so a
    /// five-way split keeps unescaped commas inside the trailing tags column.
    pub fn parse_csv_line(line: &str) -> Option<Activity> {
        let mut columns = line.splitn(5, ',');
        let app_name = columns.next()?.trim();
        if app_name.is_empty() {
            return None;
        }
        let start_time = parse_timestamp(columns.next()?).ok()?;
        let end_time = parse_timestamp(columns.next()?).ok()?;
        // Legacy logs store durations as floats.
        let duration: f64 = columns.next()?.trim().parse().ok()?;
        let tags = columns.next().unwrap_or("").trim().to_string();
        Some(Activity {
            app_name: app_name.into(),
            start_time,
            end_time,
            duration_seconds: duration.round() as i64,
            tags,
        })
    }
}

mod timestamp_ser {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    use crate::utils::time::{format_timestamp, parse_timestamp};

    pub fn serialize<S>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(*time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_timestamp(&s).map_err(serde::de::Error::custom)
    }
}

/// The activity currently being tracked. At most one exists, owned by the
/// session tracker; readers get clones through a watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenActivity {
    pub app_name: Arc<str>,
    pub start_time: DateTime<Utc>,
}

impl OpenActivity {
    pub fn start(app_name: Arc<str>, now: DateTime<Utc>) -> Self {
        Self {
            app_name,
            start_time: now,
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.start_time
    }

    pub fn close(&self, end: DateTime<Utc>) -> Activity {
        Activity {
            app_name: self.app_name.clone(),
            start_time: self.start_time,
            end_time: end,
            duration_seconds: (end - self.start_time).num_seconds(),
            tags: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn moment(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn csv_line_round_trip() {
        let activity = Activity {
            app_name: "VS Code".into(),
            start_time: moment(0),
            end_time: moment(90),
            duration_seconds: 90,
            tags: "work,rust".into(),
        };
        let parsed = Activity::parse_csv_line(&activity.to_csv_line()).unwrap();
        assert_eq!(parsed, activity);
    }

    #[test]
    fn parse_accepts_float_durations() {
        let line = "PyCharm,2023-11-14 22:13:20,2023-11-14 22:14:20,60.0,";
        let parsed = Activity::parse_csv_line(line).unwrap();
        assert_eq!(parsed.duration_seconds, 60);
        assert_eq!(parsed.tags, "");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Activity::parse_csv_line(""), None);
        assert_eq!(Activity::parse_csv_line("app_name,start_time,end_time,duration_seconds,tags"), None);
        assert_eq!(Activity::parse_csv_line("X,not a date,also not,1,"), None);
    }

    #[test]
    fn commas_in_tags_survive_the_round_trip() {
        let activity = Activity {
            app_name: "Slack".into(),
            start_time: moment(0),
            end_time: moment(10),
            duration_seconds: 10,
            tags: "a,b,c".into(),
        };
        let parsed = Activity::parse_csv_line(&activity.to_csv_line()).unwrap();
        assert_eq!(parsed.tags, "a,b,c");
    }

    #[test]
    fn clamp_trims_and_drops() {
        let activity = Activity {
            app_name: "X".into(),
            start_time: moment(10),
            end_time: moment(50),
            duration_seconds: 40,
            tags: String::new(),
        };
        let clamped = activity.clone().clamp(moment(20), moment(40)).unwrap();
        assert_eq!(clamped.start_time, moment(20));
        assert_eq!(clamped.end_time, moment(40));
        assert_eq!(clamped.duration_seconds, 20);

        assert_eq!(activity.clamp(moment(50), moment(60)), None);
    }

    #[test]
    fn sentinels_are_not_real() {
        let mut open = OpenActivity::start(IDLE_NAME.into(), moment(0));
        assert!(!open.close(moment(5)).is_real());
        open.app_name = BREAK_NAME.into();
        assert!(!open.close(moment(5)).is_real());
        open.app_name = "Terminal/CMD".into();
        assert!(open.close(moment(5)).is_real());
    }
}
