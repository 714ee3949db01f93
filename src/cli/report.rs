use std::{collections::HashMap, fmt::Display, path::PathBuf, sync::Arc};

use ansi_term::{Colour, Style};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Local, Utc};
use chrono_english::parse_date_string;
use clap::{Parser, ValueEnum};
use now::DateTimeNow;
use serde::Serialize;

use crate::{
    config::Settings,
    storage::{
        activity::{Activity, BREAK_NAME, IDLE_NAME, NO_WINDOW_NAME},
        store::{ActivityStore, CsvActivityStore, CSV_HEADER},
    },
    utils::{
        dir::create_application_default_path,
        percentage::{duration_percentage, Percentage},
        time::{format_duration, format_timestamp},
    },
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"1 hour ago\", \"15/03/2025\". Defaults to the start of today"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Same formats as --start. Defaults to now"
    )]
    end_date: Option<String>,
    #[arg(long, help = "Report the current week instead of a custom range")]
    week: bool,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        short = 'p',
        long = "percentage",
        help = "Filter apps to have at least specified percentage",
        default_value_t = Percentage::new_opt(0.).unwrap()
    )]
    min_percentage: Percentage,
    #[arg(long, help = "Emit report rows as json instead of a table")]
    json: bool,
    #[arg(long, help = "Export the selected raw log rows to a csv file")]
    export: Option<PathBuf>,
}

/// A single report row: one normalized app and its share of the range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppUsage {
    pub app_name: Arc<str>,
    pub duration_seconds: i64,
    pub productive: bool,
}

impl AppUsage {
    fn duration(&self) -> Duration {
        Duration::seconds(self.duration_seconds)
    }
}

#[derive(Debug)]
pub struct UsageReport {
    pub rows: Vec<AppUsage>,
    pub total: Duration,
    pub productive: Duration,
}

pub async fn process_report_command(command: ReportCommand) -> Result<()> {
    let dir = create_application_default_path()?;
    let settings = Settings::load(&dir);
    let store = CsvActivityStore::new(dir)?;

    let (start, end) = resolve_range(&command)?;
    let activities = store
        .load_all()
        .await?
        .into_iter()
        .filter_map(|activity| activity.clamp(start, end))
        .collect::<Vec<_>>();

    if let Some(path) = &command.export {
        export_csv(path, &activities)?;
        println!("Exported {} rows to {}", activities.len(), path.display());
        return Ok(());
    }

    let report = build_report(&activities, &settings, command.min_percentage);
    if command.json {
        println!("{}", serde_json::to_string_pretty(&report.rows)?);
    } else {
        print_report(&report, start, end);
    }
    Ok(())
}

fn resolve_range(command: &ReportCommand) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let now = Local::now();
    if command.week {
        return Ok((
            now.beginning_of_week().with_timezone(&Utc),
            now.with_timezone(&Utc),
        ));
    }

    let dialect = command.date_style.into();
    let parse = |text: &String| {
        parse_date_string(text, now, dialect)
            .map(|date| date.with_timezone(&Utc))
            .map_err(|e| anyhow!("Can't parse date \"{text}\": {e}"))
    };

    let start = match &command.start_date {
        Some(text) => parse(text)?,
        None => now.beginning_of_day().with_timezone(&Utc),
    };
    let end = match &command.end_date {
        Some(text) => parse(text)?,
        None => now.with_timezone(&Utc),
    };
    if start >= end {
        return Err(anyhow!("Range start must come before its end"));
    }
    Ok((start, end))
}

fn is_sentinel(app_name: &str) -> bool {
    matches!(app_name, IDLE_NAME | BREAK_NAME | NO_WINDOW_NAME)
}

/// Aggregates clamped activities into per-app rows, largest first, dropping
/// apps below the percentage threshold.
pub fn build_report(
    activities: &[Activity],
    settings: &Settings,
    min_percentage: Percentage,
) -> UsageReport {
    let mut durations = HashMap::<Arc<str>, Duration>::new();
    let mut total = Duration::zero();

    for activity in activities {
        total += activity.duration();
        *durations
            .entry(activity.app_name.clone())
            .or_insert_with(Duration::zero) += activity.duration();
    }

    let threshold = total * (*min_percentage as i32) / 100;

    let mut rows = durations
        .into_iter()
        .filter(|(_, duration)| *duration >= threshold)
        .map(|(app_name, duration)| AppUsage {
            productive: !is_sentinel(&app_name) && settings.is_productive(&app_name),
            duration_seconds: duration.num_seconds(),
            app_name,
        })
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| {
        b.duration_seconds
            .cmp(&a.duration_seconds)
            .then_with(|| a.app_name.cmp(&b.app_name))
    });

    let productive = rows
        .iter()
        .filter(|row| row.productive)
        .map(AppUsage::duration)
        .fold(Duration::zero(), |acc, d| acc + d);

    UsageReport {
        rows,
        total,
        productive,
    }
}

fn print_report(report: &UsageReport, start: DateTime<Utc>, end: DateTime<Utc>) {
    println!(
        "Activity from {} to {} (UTC)",
        format_timestamp(start),
        format_timestamp(end)
    );
    if report.rows.is_empty() {
        println!("No tracked activity in this range");
        return;
    }

    for row in &report.rows {
        let name = if row.productive {
            Colour::Green.paint(row.app_name.as_ref())
        } else if is_sentinel(&row.app_name) {
            Style::new().dimmed().paint(row.app_name.as_ref())
        } else {
            Style::new().paint(row.app_name.as_ref())
        };
        println!(
            "{:>9}  {:>6}  {}{}",
            format_duration(row.duration()),
            duration_percentage(row.duration(), report.total).to_string(),
            name,
            if row.productive { " *" } else { "" },
        );
    }

    println!(
        "\nTotal tracked {}, productive {} ({})",
        format_duration(report.total),
        format_duration(report.productive),
        duration_percentage(report.productive, report.total),
    );
}

fn export_csv(path: &std::path::Path, activities: &[Activity]) -> Result<()> {
    let mut content = String::from(CSV_HEADER);
    content.push('\n');
    for activity in activities {
        content.push_str(&activity.to_csv_line());
        content.push('\n');
    }
    std::fs::write(path, content)?;
    Ok(())
}
