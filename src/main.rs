//! Fiverr Inbox Export - page through an authenticated Fiverr inbox and
//! export its contacts and conversations.
//!
//! The tool walks the contact list and per-counterpart message history with
//! cursor-based pagination, reassembles each conversation in chronological
//! order, and renders it as Markdown, JSON, CSV or plain text.
//!
//! QUICK START:
//!   inbox-export init                    # Write ~/.fiverr-inbox-export/config.toml
//!   inbox-export fetch-contacts          # Page through all contacts
//!   inbox-export extract <username>      # Assemble one conversation
//!   inbox-export show -f txt             # Print it
//!   inbox-export export                  # Write md/json/csv/txt files

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_contacts_table, format_conversation_stats, ExportWriter, ExporterService, Notifier,
    Outcome,
};
use cli::{
    parse_contact_format, parse_date_format, parse_export_format, parse_export_formats, Cli,
    Commands,
};
use domain::{AppConfig, AppError, Command, DateFormat, ProgressEvent, Result};
use infrastructure::{ensure_config_exists_in, load_config, HttpInboxClient, SqliteKvStore};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Commands::Init) {
        return cmd_init();
    }

    let config = load_config()?;
    let store = Arc::new(SqliteKvStore::open(&config.storage_db_path())?);
    let api = Arc::new(HttpInboxClient::new(&config.api)?);
    let (notifier, printer) = if cli.quiet {
        (Notifier::silent(), None)
    } else {
        let (notifier, events) = Notifier::channel(&config.notify);
        (notifier, Some(spawn_progress_printer(events)))
    };

    let service = ExporterService::new(config.clone(), api, store.clone(), notifier);
    let output = dispatch(cli.command, &service, &config, &store).await;

    // Dropping the service closes the progress channel so the printer drains.
    drop(service);
    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            tracing::debug!(error = %e, "Progress printer stopped abnormally");
        }
    }

    println!("{}", output?);
    Ok(())
}

async fn dispatch(
    command: Commands,
    service: &ExporterService,
    config: &AppConfig,
    store: &SqliteKvStore,
) -> Result<String> {
    match command {
        Commands::Init => Ok(String::new()),
        Commands::FetchContacts => cmd_fetch_contacts(service, config).await,
        Commands::Contacts { limit } => cmd_contacts(service, limit).await,
        Commands::Target { identity } => {
            service.set_target(&identity).await?;
            Ok(format!("{} Target set to {}", "✓".green().bold(), identity.trim().cyan()))
        }
        Commands::Extract { identity } => cmd_extract(service, config, identity.as_deref()).await,
        Commands::Show { format } => {
            let format = parse_export_format(&format).map_err(config_error)?;
            service.render_current(format).await
        }
        Commands::Export { format, dir } => cmd_export(service, &format, dir).await,
        Commands::ExportContacts { format, dir } => {
            let format = parse_contact_format(&format).map_err(config_error)?;
            let path = service.export_contacts(format, dir).await?;
            Ok(format!("{} Exported contacts to {}", "✓".green().bold(), path.display()))
        }
        Commands::DateFormat { value } => cmd_date_format(service, value.as_deref()).await,
        Commands::Status => cmd_status(service, config, store).await,
    }
}

/// Write the default config file.
fn cmd_init() -> Result<()> {
    let (path, created) = ensure_config_exists_in(&AppConfig::default_data_dir())?;
    if created {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    println!("Set your session cookie in [api].cookie or the FIVERR_COOKIE environment variable.");
    Ok(())
}

/// Fetch all contacts command.
async fn cmd_fetch_contacts(service: &ExporterService, config: &AppConfig) -> Result<String> {
    warn_if_no_cookie(config);
    run_command(service, Command::FetchAllContacts).await
}

/// Runs a pipeline command and describes its outcome.
async fn run_command(service: &ExporterService, command: Command) -> Result<String> {
    let outcome = service.handle(command).await?;
    let date_format = service.checkpoint().date_format().await?;

    Ok(match outcome {
        Outcome::Contacts(report) => {
            let mut out = format_contacts_table(&report.contacts, date_format);
            out.push_str(&format!(
                "\n\n{} {} contacts in {} batches",
                "📇".bold(),
                report.contacts.len().to_string().cyan(),
                report.batches
            ));
            if let Some(failure) = report.failure {
                out.push_str(&format!(
                    "\n{} Stopped early: {}",
                    "⚠".yellow().bold(),
                    failure.yellow()
                ));
            }
            out
        }
        Outcome::Conversation(conversation) => format!(
            "{}\n\n💡 Next: inbox-export show -f txt | inbox-export export",
            format_conversation_stats(&conversation, date_format)
        ),
    })
}

/// List stored contacts command.
async fn cmd_contacts(service: &ExporterService, limit: usize) -> Result<String> {
    let mut contacts = service.checkpoint().contacts().await?;
    if contacts.is_empty() {
        return Ok("No contacts stored. Run fetch-contacts first.".to_string());
    }

    let total = contacts.len();
    if limit > 0 {
        contacts.truncate(limit);
    }
    let date_format = service.checkpoint().date_format().await?;

    Ok(format!(
        "{}\n\nShowing {} of {} contacts",
        format_contacts_table(&contacts, date_format),
        contacts.len(),
        total
    ))
}

/// Extract conversation command.
async fn cmd_extract(
    service: &ExporterService,
    config: &AppConfig,
    identity: Option<&str>,
) -> Result<String> {
    if let Some(identity) = identity {
        service.set_target(identity).await?;
    }
    warn_if_no_cookie(config);

    run_command(service, Command::ExtractConversation).await
}

/// Export stored conversation command.
async fn cmd_export(
    service: &ExporterService,
    format: &str,
    dir: Option<PathBuf>,
) -> Result<String> {
    let formats = parse_export_formats(format).map_err(config_error)?;
    let paths = service.export_conversation(&formats, dir).await?;

    let mut out = String::new();
    for path in &paths {
        out.push_str(&format!("{} {}\n", "✓".green(), path.display()));
    }
    out.push_str(&format!("\n{} Exported {} file(s)", "📁".bold(), paths.len()));
    Ok(out)
}

/// Show or set the date format.
async fn cmd_date_format(service: &ExporterService, value: Option<&str>) -> Result<String> {
    let Some(value) = value else {
        let current = service.checkpoint().date_format().await?;
        let options = DateFormat::ALL
            .iter()
            .map(|f| {
                if *f == current {
                    format!("  * {}", f.key().green())
                } else {
                    format!("    {}", f.key())
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Ok(format!("Current date format: {}\n{options}", current.key().cyan()));
    };

    let format = parse_date_format(value).map_err(config_error)?;
    let rerendered = service.set_date_format(format).await?;

    let mut out = format!("{} Date format set to {}", "✓".green().bold(), format.key().cyan());
    if rerendered {
        out.push_str("\n  Stored conversation re-rendered");
    }
    Ok(out)
}

/// Show storage paths and stored state.
async fn cmd_status(
    service: &ExporterService,
    config: &AppConfig,
    store: &SqliteKvStore,
) -> Result<String> {
    let status = service.status().await?;
    let exports = ExportWriter::new(config.exports_dir()).summary()?;
    let keys = store.keys()?;

    let last_fetch = status.last_fetch_time.map_or_else(
        || "never".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    let current = status.current_conversation.map_or_else(
        || "none".to_string(),
        |(identity, count)| format!("{identity} ({count} messages)"),
    );
    let cookie = if config.api.resolved_cookie().is_some() {
        "configured".green()
    } else {
        "missing".red()
    };

    Ok(format!(
        "{}\n  Data dir: {}\n  Storage: {} ({} keys)\n  Exports: {} ({} files, {})\n  Cookie: {}\n\n{}\n  Contacts: {}\n  Last fetch: {}\n  Target: {}\n  Conversation: {}\n  Date format: {}",
        "📂 Paths".bold(),
        config.data_dir().display(),
        config.storage_db_path().display(),
        keys.len(),
        config.exports_dir().display(),
        exports.file_count,
        exports.total_human(),
        cookie,
        "📊 Stored state".bold(),
        status.contact_count.to_string().cyan(),
        last_fetch,
        status.target_identity.as_deref().unwrap_or("none").cyan(),
        current,
        status.date_format.key()
    ))
}

/// Print progress events as they arrive.
fn spawn_progress_printer(mut events: mpsc::Receiver<ProgressEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let line = event.summary();
            if event.is_error() {
                eprintln!("{} {}", "✗".red().bold(), line.red());
            } else if event.is_terminal() {
                eprintln!("{} {}", "✓".green().bold(), line);
            } else {
                eprintln!("{} {}", "→".cyan(), line.dimmed());
            }
        }
    })
}

fn warn_if_no_cookie(config: &AppConfig) {
    if config.api.resolved_cookie().is_none() {
        eprintln!(
            "{} No session cookie configured; set [api].cookie or FIVERR_COOKIE",
            "⚠".yellow().bold()
        );
    }
}

fn config_error(message: String) -> AppError {
    AppError::Config { message }
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
