use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use gcal_auth::TokenStore;
use gcal_calendar::schedule::today_in;
use gcal_calendar::{CalendarClient, CalendarError, EventDeleter, RetryConfig, ScheduleExporter};
use gcal_core::{AuthError, Config, ConfigError};

#[derive(Parser)]
#[command(name = "gcal-automate", version)]
#[command(about = "Delete listed Google Calendar events and export the daily schedule")]
struct Cli {
    /// Config file (default: <config dir>/gcal-automate/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// IANA time zone for day boundaries, e.g. America/Chicago
    #[arg(long, global = true)]
    time_zone: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete the events listed in the delete file, then export today's schedule
    Run {
        /// Only report what would be deleted or cancelled
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete or cancel the events listed in a file
    Delete {
        /// Lines of `<start> - <end> - <summary>`
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Calendar ID (default from config)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Only report what would be deleted or cancelled
        #[arg(long)]
        dry_run: bool,
    },
    /// Export a day's events, hour by hour up to now
    Export {
        /// Day to export (YYYY-MM-DD, default today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Output file (default from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Calendar ID (default from config)
        #[arg(short, long)]
        calendar: Option<String>,
    },
    /// Sign in with Google and cache the token
    Auth,
    /// Remove the cached token
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    if let Err(e) = gcal_core::init(filter) {
        eprintln!("{:#}", e);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let command = cli.command.unwrap_or(Commands::Run { dry_run: false });
    let calendar = match &command {
        Commands::Delete { calendar, .. } | Commands::Export { calendar, .. } => calendar.clone(),
        _ => None,
    };
    let (config, _) = Config::load_validated(cli.config.as_deref(), calendar, cli.time_zone)?;
    let calendar_id = config.calendar.calendar_id.as_str();

    match command {
        Commands::Run { dry_run } => {
            let tz = config.time_zone()?;
            let client = connect(&config).await?;

            let mut code = ExitCode::SUCCESS;
            let delete_file = &config.files.delete_events_path;
            if delete_file.exists() {
                code = delete(&client, calendar_id, delete_file, tz, dry_run).await?;
            } else {
                tracing::warn!("No delete file at {}, skipping deletion", delete_file.display());
            }

            let today = today_in(tz, Utc::now());
            export(&client, calendar_id, today, &config.files.schedule_output_path, tz).await?;
            Ok(code)
        }
        Commands::Delete { file, dry_run, .. } => {
            let tz = config.time_zone()?;
            let file = file.unwrap_or_else(|| config.files.delete_events_path.clone());
            let client = connect(&config).await?;
            delete(&client, calendar_id, &file, tz, dry_run).await
        }
        Commands::Export { date, output, .. } => {
            let tz = config.time_zone()?;
            let date = date.unwrap_or_else(|| today_in(tz, Utc::now()));
            let output = output.unwrap_or_else(|| config.files.schedule_output_path.clone());
            let client = connect(&config).await?;
            export(&client, calendar_id, date, &output, tz).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Auth => {
            let store = TokenStore::new(&config.auth.token_path);
            gcal_auth::sign_in(&config.auth.credentials_path, &store).await?;
            println!("Signed in. Token saved to {}", store.path().display());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Logout => {
            let store = TokenStore::new(&config.auth.token_path);
            if store.delete()? {
                println!("Removed {}", store.path().display());
            } else {
                println!("No cached token at {}", store.path().display());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn connect(config: &Config) -> Result<CalendarClient> {
    let token = gcal_auth::authorize(&config.auth.credentials_path, &config.auth.token_path)
        .await
        .context("Failed to authorize with Google")?;

    let retry = RetryConfig::new(
        config.api.max_retries,
        config.api.initial_retry_delay_ms,
        config.api.max_retry_delay_ms,
    );
    Ok(CalendarClient::new(&token.access_token).with_retry_config(retry))
}

async fn delete(
    client: &CalendarClient,
    calendar_id: &str,
    file: &Path,
    tz: Tz,
    dry_run: bool,
) -> Result<ExitCode> {
    let report = EventDeleter::new(client, calendar_id)
        .dry_run(dry_run)
        .run_file(file, tz)
        .await?;

    let prefix = if dry_run { "Dry run: " } else { "" };
    println!("{}{}", prefix, report);

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn export(
    client: &CalendarClient,
    calendar_id: &str,
    date: NaiveDate,
    output: &Path,
    tz: Tz,
) -> Result<()> {
    let report = ScheduleExporter::new(client, calendar_id, tz)
        .export(date, Utc::now(), output)
        .await?;
    println!("Schedule for {} written to {}: {}", date, output.display(), report);
    Ok(())
}

fn report_error(error: &anyhow::Error) {
    eprintln!("Error: {:#}", error);

    for cause in error.chain() {
        let hint = if let Some(e) = cause.downcast_ref::<AuthError>() {
            e.user_message().to_string()
        } else if let Some(e) = cause.downcast_ref::<ConfigError>() {
            e.user_message().to_string()
        } else if let Some(e) = cause.downcast_ref::<CalendarError>() {
            e.user_message()
        } else {
            continue;
        };
        eprintln!("Hint: {}", hint);
        break;
    }
}
