//! The `lustre process` command for enhancing a directory of images.

mod batch;

use clap::Args;
use lustre_core::pipeline::FileDiscovery;
use lustre_core::{Config, Lustre};
use std::path::{Path, PathBuf};

use batch::process_batch;

/// Arguments for the `process` command.
#[derive(Args, Debug, Default)]
pub struct ProcessArgs {
    /// Input directory (overrides `input_directory`)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory (overrides `output_directory`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of chunks processed concurrently (overrides `batch.workers`)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Write a report of every result: JSON for `.json`, JSON Lines otherwise
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl ProcessArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.input_directory = expand(input);
        }
        if let Some(output) = &self.output {
            config.output_directory = expand(output);
        }
        if let Some(workers) = self.workers {
            config.batch.workers = workers.max(1);
        }
    }
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Execute the process command.
///
/// Per-image failures are reported but do not fail the command; a missing
/// or unreadable input directory does.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    let lustre = Lustre::new(config);

    let input = lustre.config().input_dir();
    let files = lustre.discover().map_err(|e| {
        anyhow::anyhow!("{e}\n  Check `input_directory` in your config or pass --input.")
    })?;

    if files.is_empty() {
        tracing::warn!("No supported images found in {:?}", input);
        return Ok(());
    }
    tracing::info!(
        "Found {} image(s) ({:.1} MB) in {:?}, writing to {:?}",
        files.len(),
        FileDiscovery::total_size(&files) as f64 / 1_000_000.0,
        input,
        lustre.config().output_dir()
    );

    process_batch(&lustre, files, args.report.as_deref()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let args = ProcessArgs {
            input: Some(PathBuf::from("/photos/in")),
            output: Some(PathBuf::from("/photos/out")),
            workers: Some(0),
            report: None,
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.input_directory, PathBuf::from("/photos/in"));
        assert_eq!(config.output_directory, PathBuf::from("/photos/out"));
        assert_eq!(config.batch.workers, 1);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = Config::default();
        ProcessArgs::default().apply(&mut config);
        assert_eq!(config, Config::default());
    }

    #[tokio::test]
    async fn test_missing_input_directory_is_an_error() {
        let args = ProcessArgs {
            input: Some(PathBuf::from("/nonexistent/lustre/photos")),
            ..Default::default()
        };
        assert!(execute(args, Config::default()).await.is_err());
    }
}
