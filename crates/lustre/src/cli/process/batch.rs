//! Batch run: progress bar, Ctrl-C handling, streaming report and summary.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use lustre_core::{
    DiscoveredFile, Lustre, ProcessingResult, ProcessingStats, ReportFormat, ReportWriter,
    StopSignal,
};

type FileReport = ReportWriter<BufWriter<File>>;

/// Process `files` with a live progress bar and an optional report file.
pub async fn process_batch(
    lustre: &Lustre,
    files: Vec<DiscoveredFile>,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let mut report = report_path.map(open_report).transpose()?;
    let mut report_failed = false;

    let stop = StopSignal::new();
    let ctrl_c = {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; finishing images already in progress");
                stop.stop();
            }
        })
    };

    let progress = create_progress_bar(files.len() as u64);
    let start_time = Instant::now();
    let paths = files.into_iter().map(|f| f.path).collect();

    let summary = lustre
        .process_files(paths, &stop, |result| {
            if let ProcessingResult::Failure(failed) = result {
                progress.println(format!(
                    "  failed: {} ({}: {})",
                    failed.source_path.display(),
                    failed.kind,
                    failed.message
                ));
            }
            if let Some(writer) = report.as_mut().filter(|_| !report_failed) {
                if let Err(e) = writer.record(result) {
                    tracing::warn!("Failed to write report: {e}");
                    report_failed = true;
                }
            }

            progress.inc(1);
            let elapsed = start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let rate = progress.position() as f64 / elapsed;
                progress.set_message(format!("{rate:.1} img/sec"));
            }
        })
        .await;
    ctrl_c.abort();
    progress.finish_and_clear();

    if let (Some(writer), Some(path)) = (report, report_path) {
        match writer.finish(&summary.stats) {
            Ok(_) => tracing::info!("Report written to {:?}", path),
            Err(e) => tracing::warn!("Failed to finish report {:?}: {e}", path),
        }
    }

    for line in summary_lines(&summary.stats) {
        eprintln!("{line}");
    }
    Ok(())
}

fn open_report(path: &Path) -> anyhow::Result<FileReport> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    Ok(ReportWriter::new(BufWriter::new(file), ReportFormat::from_path(path)))
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}

/// The summary table printed after a batch.
fn summary_lines(stats: &ProcessingStats) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "  ====================================".to_string(),
        "               Summary".to_string(),
        "  ====================================".to_string(),
        format!("    Succeeded:    {:>8}", stats.succeeded),
    ];
    if stats.failed > 0 {
        lines.push(format!("    Failed:       {:>8}", stats.failed));
    }
    if stats.skipped_operations > 0 {
        lines.push(format!("    Skipped ops:  {:>8}", stats.skipped_operations));
    }
    if stats.cancelled > 0 {
        lines.push(format!("    Cancelled:    {:>8}", stats.cancelled));
    }
    lines.extend([
        "  ------------------------------------".to_string(),
        format!("    Total:        {:>8}", stats.submitted + stats.cancelled),
        format!("    Duration:     {:>7.1}s", stats.total_seconds),
        format!("    Rate:         {:>7.1} img/sec", stats.images_per_second),
        "  ====================================".to_string(),
    ]);
    lines
}
