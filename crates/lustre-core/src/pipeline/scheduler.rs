//! Chunked, bounded fan-out of the pipeline over many files.
//!
//! Files are split into chunks of `chunk_size`; at most `workers` chunks run
//! at once on a [`JoinSet`]. Each chunk loads its images, runs the executor
//! over them together and writes the results. A panic inside a chunk fails
//! that chunk's images only.

use futures_util::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use crate::config::BatchConfig;
use crate::types::{FailureKind, ProcessingResult, ProcessingStats};

use super::executor::Executor;
use super::progress::{BatchProgress, StopSignal};
use super::sink::OutputSink;
use super::source::ImageSource;

/// Everything a finished batch produced.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// One result per submitted image, in completion order
    pub results: Vec<ProcessingResult>,
    pub stats: ProcessingStats,
}

impl BatchSummary {
    pub fn failures(&self) -> impl Iterator<Item = &ProcessingResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Shared stages a chunk needs.
struct Stages {
    source: Arc<ImageSource>,
    executor: Arc<Executor>,
    sink: Arc<OutputSink>,
}

pub struct BatchScheduler {
    stages: Arc<Stages>,
    workers: usize,
    chunk_size: usize,
    progress: Arc<BatchProgress>,
}

impl BatchScheduler {
    pub fn new(
        source: Arc<ImageSource>,
        executor: Arc<Executor>,
        sink: Arc<OutputSink>,
        batch: &BatchConfig,
    ) -> Self {
        Self {
            stages: Arc::new(Stages {
                source,
                executor,
                sink,
            }),
            workers: batch.workers.max(1),
            chunk_size: batch.chunk_size.max(1),
            progress: BatchProgress::new(),
        }
    }

    /// Live counters for this scheduler's runs.
    pub fn progress(&self) -> Arc<BatchProgress> {
        Arc::clone(&self.progress)
    }

    /// Load, execute and write a single file.
    pub async fn process_one(&self, path: PathBuf) -> ProcessingResult {
        let mut results = run_chunk(Arc::clone(&self.stages), vec![path.clone()]).await;
        results.pop().unwrap_or_else(|| {
            ProcessingResult::failed(&path, FailureKind::Internal, "no result produced")
        })
    }

    /// Process `files`, calling `on_result` as each image finishes.
    ///
    /// `stop` is checked before every chunk submission. Returns once every
    /// submitted chunk has finished.
    pub async fn run<F>(
        &self,
        files: Vec<PathBuf>,
        stop: &StopSignal,
        mut on_result: F,
    ) -> BatchSummary
    where
        F: FnMut(&ProcessingResult),
    {
        let start = Instant::now();
        let total = files.len();
        let mut pending = files
            .chunks(self.chunk_size)
            .map(<[PathBuf]>::to_vec)
            .collect::<Vec<_>>()
            .into_iter();

        tracing::info!(
            "Processing {total} image(s) in chunks of {} with {} worker(s)",
            self.chunk_size,
            self.workers
        );

        let mut in_flight = JoinSet::new();
        let mut results = Vec::with_capacity(total);
        let mut outstanding = Outstanding::default();
        let mut submitted = 0usize;
        let mut cancelled = 0usize;

        loop {
            while in_flight.len() < self.workers {
                if stop.is_stopped() {
                    let rest: usize = pending.by_ref().map(|c| c.len()).sum();
                    if rest > 0 {
                        tracing::warn!("Stop requested; {rest} image(s) not submitted");
                        cancelled += rest;
                    }
                    break;
                }
                let Some(chunk) = pending.next() else { break };

                submitted += chunk.len();
                outstanding.submit(&chunk);
                self.progress.add_submitted(chunk.len());
                in_flight.spawn(run_chunk(Arc::clone(&self.stages), chunk));
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let chunk_results = match joined {
                Ok(chunk_results) => chunk_results,
                Err(e) => {
                    tracing::error!("Chunk task ended abnormally: {e}");
                    continue;
                }
            };
            for result in chunk_results {
                outstanding.settle(result.source_path());
                self.progress.record(&result);
                on_result(&result);
                results.push(result);
            }
        }

        // Images of a chunk task that ended without results still count.
        for result in outstanding.into_failures() {
            self.progress.record(&result);
            on_result(&result);
            results.push(result);
        }

        let snapshot = self.progress.snapshot();
        let elapsed = start.elapsed().as_secs_f64();
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let stats = ProcessingStats {
            submitted,
            succeeded,
            failed: results.len() - succeeded,
            skipped_operations: results.iter().map(|r| r.skipped_operations()).sum(),
            cancelled,
            images_per_second: if elapsed > 0.0 {
                results.len() as f64 / elapsed
            } else {
                0.0
            },
            total_seconds: elapsed,
        };
        tracing::debug!(?snapshot, "Batch finished");

        BatchSummary { results, stats }
    }
}

/// Submitted paths still waiting for a result. Paths are counted so a file
/// listed twice needs two results.
#[derive(Debug, Default)]
struct Outstanding(BTreeMap<PathBuf, usize>);

impl Outstanding {
    fn submit(&mut self, paths: &[PathBuf]) {
        for path in paths {
            *self.0.entry(path.clone()).or_default() += 1;
        }
    }

    fn settle(&mut self, path: &Path) {
        if let Some(count) = self.0.get_mut(path) {
            *count -= 1;
            if *count == 0 {
                self.0.remove(path);
            }
        }
    }

    fn into_failures(self) -> Vec<ProcessingResult> {
        self.0
            .into_iter()
            .flat_map(|(path, count)| std::iter::repeat(path).take(count))
            .map(|path| {
                ProcessingResult::failed(
                    &path,
                    FailureKind::Internal,
                    "chunk task ended without a result",
                )
            })
            .collect()
    }
}

/// One chunk, with panics turned into `Internal` failures for its images.
async fn run_chunk(stages: Arc<Stages>, paths: Vec<PathBuf>) -> Vec<ProcessingResult> {
    let work = process_chunk(Arc::clone(&stages), paths.clone());
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(results) => results,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Chunk of {} image(s) panicked: {message}", paths.len());
            paths
                .iter()
                .map(|p| {
                    let message = format!("panicked: {message}");
                    ProcessingResult::failed(p, FailureKind::Internal, message)
                })
                .collect()
        }
    }
}

async fn process_chunk(stages: Arc<Stages>, paths: Vec<PathBuf>) -> Vec<ProcessingResult> {
    let mut results = Vec::with_capacity(paths.len());
    let mut loaded = Vec::with_capacity(paths.len());

    for path in paths {
        match stages.source.load(&path).await {
            Ok(image) => loaded.push(image),
            Err(e) => {
                tracing::error!("Failed: {:?} - {e}", path);
                results.push(ProcessingResult::failed(&path, e.kind(), e.to_string()));
            }
        }
    }

    for executed in stages.executor.execute_chunk(loaded).await {
        results.push(stages.sink.write(executed).await);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InferenceConfig, InputConfig, LimitsConfig, OutputConfig};
    use crate::error::PipelineResult;
    use crate::handle::ImageHandle;
    use crate::inference::{DisabledBackend, InferenceBackend, InferenceContext};
    use crate::ops::{InferenceTask, OperationParams, PlannedOperation, Transform};
    use crate::types::BoundingBox;
    use async_trait::async_trait;
    use image::DynamicImage;

    /// Panics when asked to enhance an image 13 pixels wide.
    struct PanickyBackend;

    #[async_trait]
    impl InferenceBackend for PanickyBackend {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn detect_faces(&self, _image: &ImageHandle) -> PipelineResult<Vec<BoundingBox>> {
            Ok(vec![])
        }

        async fn remove_background(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
            Ok(image.clone())
        }

        async fn enhance(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
            if image.width() == 13 {
                panic!("unlucky width");
            }
            Ok(image.clone())
        }
    }

    fn write_images(dir: &Path, widths: &[u32]) -> Vec<PathBuf> {
        widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let path = dir.join(format!("img{i}.png"));
                DynamicImage::new_rgb8(w, 8).save(&path).unwrap();
                path
            })
            .collect()
    }

    fn scheduler(
        out: &Path,
        backend: Arc<dyn InferenceBackend>,
        plan: Vec<PlannedOperation>,
        workers: usize,
        chunk_size: usize,
    ) -> BatchScheduler {
        let ctx = Arc::new(InferenceContext::new(
            backend,
            &InferenceConfig {
                batch_enhance: false,
                ..Default::default()
            },
        ));
        BatchScheduler::new(
            Arc::new(ImageSource::new(InputConfig::default(), LimitsConfig::default())),
            Arc::new(Executor::new(plan, ctx, true)),
            Arc::new(OutputSink::new(out.to_path_buf(), &OutputConfig::default(), 85)),
            &BatchConfig {
                workers,
                chunk_size,
            },
        )
    }

    #[tokio::test]
    async fn test_all_images_accounted_for() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let files = write_images(input.path(), &[4, 5, 6, 7, 8]);

        let s = scheduler(output.path(), Arc::new(DisabledBackend), vec![], 2, 2);
        let mut seen = 0;
        let summary = s.run(files, &StopSignal::new(), |_| seen += 1).await;

        assert_eq!(seen, 5);
        assert_eq!(summary.stats.submitted, 5);
        assert_eq!(summary.stats.succeeded, 5);
        assert_eq!(summary.stats.failed, 0);
        assert_eq!(s.progress().snapshot().completed, 5);
    }

    #[tokio::test]
    async fn test_panicking_chunk_is_isolated() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let files = write_images(input.path(), &[10, 13, 11]);
        let plan = vec![PlannedOperation {
            name: "ai_enhance",
            params: OperationParams::AiEnhance,
            transform: Transform::Inference(InferenceTask::Enhance),
        }];

        let s = scheduler(output.path(), Arc::new(PanickyBackend), plan, 2, 1);
        let summary = s.run(files, &StopSignal::new(), |_| {}).await;

        assert_eq!(summary.stats.succeeded, 2);
        assert_eq!(summary.stats.failed, 1);
        let failed: Vec<_> = summary.failures().collect();
        match failed[0] {
            ProcessingResult::Failure(f) => {
                assert_eq!(f.kind, FailureKind::Internal);
                assert!(f.source_path.ends_with("img1.png"));
            }
            ProcessingResult::Success(_) => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_stop_before_next_submission() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let files = write_images(input.path(), &[4, 4, 4]);

        let s = scheduler(output.path(), Arc::new(DisabledBackend), vec![], 1, 1);
        let stop = StopSignal::new();
        let trigger = stop.clone();
        let summary = s.run(files, &stop, |_| trigger.stop()).await;

        assert_eq!(summary.stats.submitted, 1);
        assert_eq!(summary.stats.succeeded, 1);
        assert_eq!(summary.stats.cancelled, 2);
    }

    #[test]
    fn test_unsettled_paths_become_internal_failures() {
        let a = PathBuf::from("/in/a.png");
        let b = PathBuf::from("/in/b.png");
        let mut outstanding = Outstanding::default();
        outstanding.submit(&[a.clone(), b.clone(), b.clone()]);
        outstanding.settle(&a);
        outstanding.settle(&b);
        outstanding.settle(Path::new("/in/unknown.png"));

        let failures = outstanding.into_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source_path(), b.as_path());
        match &failures[0] {
            ProcessingResult::Failure(f) => assert_eq!(f.kind, FailureKind::Internal),
            ProcessingResult::Success(_) => unreachable!(),
        }
    }

    #[test]
    fn test_fully_settled_batch_has_no_leftovers() {
        let paths = vec![PathBuf::from("/in/a.png"), PathBuf::from("/in/b.png")];
        let mut outstanding = Outstanding::default();
        outstanding.submit(&paths);
        for path in &paths {
            outstanding.settle(path);
        }
        assert!(outstanding.into_failures().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_does_not_stop_chunk() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let mut files = write_images(input.path(), &[4, 4]);
        let corrupt = input.path().join("corrupt.png");
        std::fs::write(&corrupt, b"\x89PNG but not really").unwrap();
        files.insert(1, corrupt);

        let s = scheduler(output.path(), Arc::new(DisabledBackend), vec![], 1, 3);
        let summary = s.run(files, &StopSignal::new(), |_| {}).await;
        assert_eq!(summary.stats.succeeded, 2);
        assert_eq!(summary.stats.failed, 1);
        assert_eq!(
            summary.failures().next().map(|r| r.source_path().to_path_buf()),
            Some(input.path().join("corrupt.png"))
        );
    }
}
