//! The `lustre analyze` command: write an analysis report for one image.

use clap::Args;
use lustre_core::{Config, Lustre};
use std::path::{Path, PathBuf};

/// Arguments for the `analyze` command.
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Image file to analyze
    pub image: PathBuf,

    /// Output JSON file (defaults to `<stem>_analysis.json`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn default_output(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    PathBuf::from(format!("{stem}_analysis.json"))
}

/// Execute the analyze command.
pub async fn execute(args: AnalyzeArgs, config: Config) -> anyhow::Result<()> {
    let lustre = Lustre::new(config);
    let analysis = lustre.analyze(&args.image).await?;

    let output = args.output.unwrap_or_else(|| default_output(&args.image));
    std::fs::write(&output, serde_json::to_string_pretty(&analysis)?)?;
    println!("Analysis saved to {}", output.display());
    Ok(())
}
