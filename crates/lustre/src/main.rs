//! Lustre CLI - Batch image enhancement.
//!
//! Lustre applies a configurable, fixed-order sequence of enhancement
//! operations (upscaling, color and contrast, filters, watermarking and
//! optional model-backed steps) to every image in a directory.
//!
//! # Usage
//!
//! ```bash
//! # Enhance ./photos into ./enhanced with the settings in config.json
//! lustre process --config config.json --input ./photos --output ./enhanced
//!
//! # Write an analysis report for one image
//! lustre analyze photo.jpg
//!
//! # View configuration and the operation order
//! lustre config show
//! lustre operations
//! ```

use clap::{Parser, Subcommand};
use lustre_core::Config;
use std::path::{Path, PathBuf};

mod cli;
mod logging;

/// Lustre - Batch image-enhancement pipeline.
#[derive(Parser, Debug)]
#[command(name = "lustre")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file (JSON, or TOML by extension)
    #[arg(short, long, global = true, env = "LUSTRE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Enhance every image in the input directory
    Process(cli::process::ProcessArgs),

    /// Analyze a single image and write a JSON report
    Analyze(cli::analyze::AnalyzeArgs),

    /// Show version and inference backend status
    Version,

    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// List operations in pipeline order
    Operations,
}

/// Load the config file, falling back to defaults with a warning.
///
/// Logging isn't initialized yet, so problems go to stderr directly.
fn load_config(explicit: Option<&Path>) -> Config {
    let Some(path) = Config::locate(explicit) else {
        return Config::default();
    };
    match Config::load_strict(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config {}: {e}\n  \
                 Using default configuration. Check your config file with `lustre config path`.",
                path.display()
            );
            Config::default()
        }
    }
}

async fn show_version(config: Config) {
    println!("Lustre version {}", lustre_core::VERSION);

    let status = lustre_core::Lustre::new(config).inference_status().await;
    if status.available {
        println!("Inference backend: {} (available)", status.backend);
    } else {
        println!(
            "Inference backend: {} (unavailable; face detection, background removal \
             and AI enhancement will be skipped)",
            status.backend
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Lustre v{}", lustre_core::VERSION);

    match cli.command {
        Commands::Process(args) => cli::process::execute(args, config).await,
        Commands::Analyze(args) => cli::analyze::execute(args, config).await,
        Commands::Version => {
            show_version(config).await;
            Ok(())
        }
        Commands::Config(args) => cli::config::execute(args, config, cli.config.as_deref()).await,
        Commands::Operations => cli::operations::execute(config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_flags() {
        let cli = Cli::parse_from([
            "lustre", "process", "--config", "c.json", "--input", "in", "--workers", "3",
            "--report", "r.jsonl",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("c.json")));
        match cli.command {
            Commands::Process(args) => {
                assert_eq!(args.input, Some(PathBuf::from("in")));
                assert_eq!(args.workers, Some(3));
                assert_eq!(args.report, Some(PathBuf::from("r.jsonl")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert_eq!(load_config(Some(&path)), Config::default());
    }
}
