mod cli;
mod commands;
mod devices;
mod error_fmt;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use commands::Output;
use eyre::Result;
use station_core::MeasureRequest;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

fn main() {
    if let Err(e) = color_eyre::install() {
        eprintln!("could not install error reporter: {e}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        tracing::debug!(error = ?err, "command failed");
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = station_config::load_file(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging);
    tracing::info!(config = %cli.config.display(), "config loaded");

    let station = devices::build_station(&cfg)?;
    let out = Output::new(cli.json, &cfg);

    let result = match cli.cmd {
        Commands::Weigh { tare } => commands::run_weigh(&station, out, tare),
        Commands::Height { base } => commands::run_height(&station, out, base),
        Commands::Capture { folder, stem } => commands::run_capture(&station, out, folder, stem),
        Commands::Measure {
            tare,
            base,
            height_override,
            folder,
            stem,
        } => commands::run_measure(
            &station,
            &MeasureRequest {
                tare,
                base,
                height_override,
                folder,
                stem,
            },
        ),
        Commands::Watch { count, interval_ms } => {
            commands::run_watch(&station, out, count, Duration::from_millis(interval_ms))
        }
        Commands::SelfCheck => commands::run_self_check(&station, out),
    };
    station.stop();
    result
}

/// Console logs go to stderr so stdout carries only results. `RUST_LOG`
/// overrides `--log-level`. `[logging] file` adds a JSON-lines file layer
/// filtered by `[logging] level`.
fn init_tracing(json: bool, level: &str, logging: &station_config::Logging) {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    }
    .with_filter(console_filter);

    let file = logging.file.as_deref().map(|path| {
        let path = Path::new(path);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "station.log".into(), |n| n.to_os_string());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, &name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, &name),
            _ => tracing_appender::rolling::never(dir, &name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .with_filter(EnvFilter::new(logging.level.as_deref().unwrap_or("info")))
    });

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
}
