pub mod daemon_path;
pub mod process;
pub mod report;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_english::{parse_date_string, Dialect};
use clap::{Parser, Subcommand};
use process::{restart_daemon, stop_daemon};
use report::{process_report_command, ReportCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    config::Settings,
    daemon::start_daemon,
    editor,
    storage::store::{ActivityStore, CsvActivityStore},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
        time::{format_timestamp, TIMESTAMP_FORMAT},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Prodtrack", version, long_about = None)]
#[command(about = "Automated productivity tracker", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start the tracking daemon in the background")]
    Init {},
    #[command(
        about = "Run the daemon directly in the current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<std::path::PathBuf>,
    },
    #[command(about = "Stop the currently running daemon")]
    Stop {},
    #[command(about = "Summarize tracked activity for a date range")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Append a manual activity to the log")]
    Add {
        #[arg(help = "Activity or app name")]
        name: String,
        #[arg(long, help = "Start time, \"YYYY-MM-DD HH:MM:SS\" (UTC, as in the log) or a phrase like \"1 hour ago\"")]
        start: String,
        #[arg(long, help = "End time, same formats as --start")]
        end: String,
        #[arg(long, default_value = "", help = "Comma-separated tags")]
        tags: String,
    },
    #[command(about = "Replace the tags of the activity starting at the given time")]
    Tag {
        #[arg(help = "Start time identifying the activity, matched with one second of tolerance")]
        start: String,
        #[arg(help = "Comma-separated tags")]
        tags: String,
    },
    #[command(about = "Show or edit settings")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(about = "Delete all tracked activity")]
    Clear {
        #[arg(long, help = "Required confirmation")]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    #[command(about = "Print the current settings")]
    Show,
    #[command(about = "Set one setting, e.g. `config set idle_threshold_minutes 10`")]
    Set { key: String, value: String },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let app_dir = create_application_default_path()?;
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => restart_daemon(),
        Commands::Stop {} => stop_daemon(),
        Commands::Serve { dir } => start_daemon(dir.unwrap_or(app_dir)).await,
        Commands::Report { command } => process_report_command(command).await,
        Commands::Add {
            name,
            start,
            end,
            tags,
        } => {
            let store = CsvActivityStore::new(app_dir)?;
            let start = parse_cli_time(&start)?;
            let end = parse_cli_time(&end)?;
            let activity = editor::add_manual_activity(&store, &name, start, end, &tags).await?;
            println!(
                "Added {} from {} to {}",
                activity.app_name,
                format_timestamp(activity.start_time),
                format_timestamp(activity.end_time)
            );
            Ok(())
        }
        Commands::Tag { start, tags } => {
            let store = CsvActivityStore::new(app_dir)?;
            let start = parse_cli_time(&start)?;
            if editor::retag(&store, start, &tags).await? {
                println!("Updated tags");
            } else {
                println!("No activity starts at {}", format_timestamp(start));
            }
            Ok(())
        }
        Commands::Config { action } => handle_config(action, &app_dir),
        Commands::Clear { yes } => {
            if !yes {
                bail!("Refusing to delete the activity log without --yes");
            }
            let store = CsvActivityStore::new(app_dir)?;
            store.clear().await?;
            println!("All activity data deleted");
            Ok(())
        }
    }
}

fn handle_config(action: ConfigAction, app_dir: &std::path::Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = Settings::load(app_dir);
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load(app_dir);
            settings.set_key(&key, &value)?;
            settings.save(app_dir)?;
            println!("Saved {key}");
            if matches!(
                key.as_str(),
                "check_interval_seconds" | "idle_threshold_minutes"
            ) {
                println!("Restart the daemon (`prodtrack init`) for this to take effect");
            }
            Ok(())
        }
    }
}

/// Accepts timestamps in the log's own format (interpreted as UTC, so values
/// copied out of the log or a report match exactly) or chrono-english
/// phrases interpreted in local time.
fn parse_cli_time(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    parse_date_string(text, Local::now(), Dialect::Uk)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| anyhow!("Can't parse time \"{text}\": {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_times_are_read_as_utc() {
        let parsed = parse_cli_time("2024-03-15 09:30:05").unwrap();
        assert_eq!(format_timestamp(parsed), "2024-03-15 09:30:05");
    }

    #[test]
    fn unparseable_times_are_an_error() {
        assert!(parse_cli_time("not a time at all").is_err());
    }
}
