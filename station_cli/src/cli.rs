//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "station", version, about = "Measuring station CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/station.toml")]
    pub config: PathBuf,

    /// Print results and logs as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins if set
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read the scale once
    Weigh {
        /// Empty-platform reading in kg; the result is the difference
        #[arg(long, value_name = "KG", allow_negative_numbers = true)]
        tare: Option<f32>,
    },
    /// Read the height sensor once
    Height {
        /// Empty-platform distance in cm; the result is base minus distance
        #[arg(long, value_name = "CM", allow_negative_numbers = true)]
        base: Option<f32>,
    },
    /// Take one photo set with the ring lights on
    Capture {
        /// Folder for the photos (default: [photo] folder)
        #[arg(long, value_name = "DIR")]
        folder: Option<PathBuf>,
        /// File name prefix (default: current Unix time)
        #[arg(long, value_name = "NAME")]
        stem: Option<String>,
    },
    /// Weight, height and photos as one JSON record
    Measure {
        #[arg(long, value_name = "KG", allow_negative_numbers = true)]
        tare: Option<f32>,
        #[arg(long, value_name = "CM", allow_negative_numbers = true)]
        base: Option<f32>,
        /// Report this height instead of reading the sensor
        #[arg(long, value_name = "CM", allow_negative_numbers = true)]
        height_override: Option<f32>,
        #[arg(long, value_name = "DIR")]
        folder: Option<PathBuf>,
        #[arg(long, value_name = "NAME")]
        stem: Option<String>,
    },
    /// Print weight and height repeatedly until Ctrl-C
    Watch {
        /// Stop after this many readings
        #[arg(long, value_name = "N")]
        count: Option<u64>,
        /// Pause between readings
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Open every device once and report
    SelfCheck,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_accepts_negative_values() {
        let cli = Cli::try_parse_from([
            "station",
            "measure",
            "--tare",
            "-0.5",
            "--base",
            "-1.5",
            "--height-override",
            "-2",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Measure {
                tare,
                base,
                height_override,
                ..
            } => {
                assert_eq!(tare, Some(-0.5));
                assert_eq!(base, Some(-1.5));
                assert_eq!(height_override, Some(-2.0));
            }
            other => panic!("parsed as {other:?}"),
        }
    }
}
