//! Lustre Core - Embeddable batch image-enhancement library.
//!
//! Lustre takes a directory of images and a declarative configuration,
//! applies the enabled operations to every image in a fixed order, and
//! writes the results (plus optional thumbnails, originals and metadata
//! sidecars) to an output directory.
//!
//! # Architecture
//!
//! ```text
//! ImageSource → BatchScheduler → (per chunk) Executor → OutputSink
//! ```
//!
//! A failing operation is skipped and the image continues with its last good
//! state; an image that cannot be decoded or saved fails on its own; only a
//! missing or unreadable input directory aborts a run.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lustre_core::{Config, Lustre, StopSignal};
//!
//! #[tokio::main]
//! async fn main() -> lustre_core::Result<()> {
//!     let config = Config::load_or_default(None);
//!     let lustre = Lustre::new(config);
//!
//!     let summary = lustre.process_directory(&StopSignal::new(), |_| {}).await?;
//!     println!("{} succeeded", summary.stats.succeeded);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod analysis;
pub mod config;
pub mod error;
pub mod handle;
pub mod inference;
pub mod notify;
pub mod ops;
pub mod pipeline;
pub mod report;
pub mod types;

// Re-exports for convenient access
pub use analysis::ImageAnalysis;
pub use config::{Config, OutputFormat};
pub use error::{ConfigError, LustreError, PipelineError, PipelineResult, RegistryError, Result};
pub use handle::{ImageHandle, Metadata};
pub use ops::{OperationRegistry, PlannedOperation};
pub use pipeline::{BatchSummary, DiscoveredFile, ProgressSnapshot, StopSignal};
pub use report::{ReportFormat, ReportWriter};
pub use types::{FailureKind, ProcessedImage, ProcessingResult, ProcessingStats};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use inference::{InferenceBackend, InferenceContext};
use notify::Notifier;
use ops::Transform;
use pipeline::{BatchScheduler, Executor, ImageSource, OutputSink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name and reachability of the configured inference backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceStatus {
    pub backend: String,
    pub available: bool,
}

/// Lustre processor - the main entry point for batch enhancement.
///
/// Built once from a [`Config`]; the operation plan, image source and output
/// sink are fixed for its lifetime. Each run gets a fresh inference context
/// that is closed when the run ends.
pub struct Lustre {
    config: Config,
    registry: OperationRegistry,
    plan: Vec<PlannedOperation>,
    backend: Arc<dyn InferenceBackend>,
    source: Arc<ImageSource>,
    sink: Arc<OutputSink>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Lustre {
    /// Create a processor. Out-of-range settings are clamped with a warning.
    pub fn new(mut config: Config) -> Self {
        for adjustment in config.sanitize() {
            tracing::warn!("Config: {adjustment}");
        }
        let quality = config.compression_quality;
        if let Some(note) = pipeline::sink::unused_quality_note(quality, config.format_conversion) {
            tracing::warn!("Config: {note}");
        }
        tracing::debug!("Initializing Lustre v{}", VERSION);

        let registry = OperationRegistry::builtin();
        let plan = registry.plan(&config);
        let backend = inference::backend_from_config(&config.inference);
        let source = ImageSource::new(config.input.clone(), config.limits.clone());
        let sink = OutputSink::new(
            config.output_dir(),
            &config.output,
            config.compression_quality,
        );
        let notifier = notify::notifier_from_config(&config.notifications);

        Self {
            config,
            registry,
            plan,
            backend,
            source: Arc::new(source),
            sink: Arc::new(sink),
            notifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Every registered operation in pipeline order.
    pub fn operations(&self) -> &OperationRegistry {
        &self.registry
    }

    /// The enabled operations, in the order they run.
    pub fn plan(&self) -> &[PlannedOperation] {
        &self.plan
    }

    pub async fn inference_status(&self) -> InferenceStatus {
        InferenceStatus {
            backend: self.backend.name().to_string(),
            available: self.backend.is_available().await,
        }
    }

    /// List the images the configured input directory holds.
    pub fn discover(&self) -> PipelineResult<Vec<DiscoveredFile>> {
        self.source.enumerate(&self.config.input_dir())
    }

    /// Process every image in the configured input directory.
    ///
    /// Fails only when the directory is missing or unreadable; per-image
    /// outcomes are in the returned summary.
    pub async fn process_directory<F>(
        &self,
        stop: &StopSignal,
        on_result: F,
    ) -> PipelineResult<BatchSummary>
    where
        F: FnMut(&ProcessingResult),
    {
        let files = self.discover()?;
        Ok(self
            .process_files(files.into_iter().map(|f| f.path).collect(), stop, on_result)
            .await)
    }

    /// Process an explicit list of files as one batch.
    pub async fn process_files<F>(
        &self,
        files: Vec<PathBuf>,
        stop: &StopSignal,
        mut on_result: F,
    ) -> BatchSummary
    where
        F: FnMut(&ProcessingResult),
    {
        if files.is_empty() {
            tracing::warn!("No images to process in {:?}", self.config.input_dir());
            return BatchSummary::default();
        }
        if let Err(e) = self.sink.prepare_dir() {
            tracing::error!("{e}");
        }
        self.warn_if_inference_unavailable().await;

        let context = self.open_context();
        let scheduler = BatchScheduler::new(
            Arc::clone(&self.source),
            Arc::new(Executor::new(
                self.plan.clone(),
                Arc::clone(&context),
                self.config.preserve_metadata,
            )),
            Arc::clone(&self.sink),
            &self.config.batch,
        );

        let per_image = self
            .notifier
            .as_ref()
            .filter(|_| self.config.notifications.per_image);

        let summary = scheduler
            .run(files, stop, |result| {
                if let (Some(notifier), ProcessingResult::Success(image)) = (per_image, result) {
                    notify::notify_detached(
                        notifier,
                        "Image processed",
                        format!("{}", image.output_path.display()),
                    );
                }
                on_result(result);
            })
            .await;
        context.close();

        let stats = &summary.stats;
        tracing::info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped_operations = stats.skipped_operations,
            cancelled = stats.cancelled,
            "Batch finished in {:.1}s",
            stats.total_seconds
        );
        if let Some(notifier) = &self.notifier {
            let message = format!(
                "{} succeeded, {} failed, {} operation(s) skipped",
                stats.succeeded, stats.failed, stats.skipped_operations
            );
            notifier.notify("Batch complete", &message).await;
        }
        summary
    }

    /// Process a single file.
    pub async fn process_file(&self, path: &Path) -> ProcessingResult {
        if let Err(e) = self.sink.prepare_dir() {
            tracing::error!("{e}");
        }
        let context = self.open_context();
        let scheduler = BatchScheduler::new(
            Arc::clone(&self.source),
            Arc::new(Executor::new(
                self.plan.clone(),
                Arc::clone(&context),
                self.config.preserve_metadata,
            )),
            Arc::clone(&self.sink),
            &self.config.batch,
        );
        let result = scheduler.process_one(path.to_path_buf()).await;
        context.close();
        result
    }

    /// Load one image and compute its analysis report.
    pub async fn analyze(&self, path: &Path) -> PipelineResult<ImageAnalysis> {
        analysis::analyze_file(&self.source, path).await
    }

    fn open_context(&self) -> Arc<InferenceContext> {
        Arc::new(InferenceContext::new(
            Arc::clone(&self.backend),
            &self.config.inference,
        ))
    }

    async fn warn_if_inference_unavailable(&self) {
        let needs_inference: Vec<&str> = self
            .plan
            .iter()
            .filter(|op| matches!(op.transform, Transform::Inference(_)))
            .map(|op| op.name)
            .collect();
        if !needs_inference.is_empty() && !self.backend.is_available().await {
            tracing::warn!(
                "Inference backend '{}' is unavailable; {} will be skipped",
                self.backend.name(),
                needs_inference.join(", ")
            );
        }
    }
}
