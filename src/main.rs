mod cli;
mod commands;
mod config;
mod planner;
mod schedule;
mod settings;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let _log_guard = init_logging(&args.log_level);

    let ctx = commands::AppContext {
        config: config::load_config(args.config.as_deref())?,
        store_path: args.store,
    };
    tracing::debug!(config = ?ctx.config.path, from_file = ctx.config.from_file, "loaded config");

    let command = args.command.unwrap_or(cli::Command::Tui);
    let result = match command {
        cli::Command::Init => commands::init(),
        cli::Command::Show => commands::show(&ctx),
        cli::Command::Now => commands::now(&ctx),
        cli::Command::Toggle { time } => commands::toggle(&ctx, time),
        cli::Command::Sleep { start, end } => commands::sleep(&ctx, start, end),
        cli::Command::Note { hour, text } => commands::note(&ctx, hour, text),
        cli::Command::Config => commands::config(&ctx),
        cli::Command::Tui => commands::tui(&ctx),
    };
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    result
}

/// Logs go to a daily file under the data dir so they never draw over the TUI.
fn init_logging(level: &str) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dayplan={},warn", level)));

    let log_dir = storage::project_dirs()
        .ok()
        .map(|dirs| dirs.data_dir().join("logs"));
    if let Some(log_dir) = log_dir {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("dayplan")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();
            if let Some(appender) = appender {
                let (writer, guard) = tracing_appender::non_blocking(appender);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .init();
                return Some(guard);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::warn!("file logging unavailable, logging to stderr");
    None
}
