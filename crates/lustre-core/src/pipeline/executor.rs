//! Applies the planned operations to loaded images.
//!
//! The executor walks the plan in registry order and dispatches on the
//! transform kind only. Pixel transforms run on the blocking pool; inference
//! transforms go through the shared [`InferenceContext`]. A failing or
//! panicking step is recorded as skipped and the last good image is kept.
//!
//! A chunk of images advances through the plan in lockstep, so the enhance
//! step can send the whole chunk to the backend in one batched call. Each
//! image still sees the operations strictly one after another.

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;

use crate::config::OutputFormat;
use crate::error::PipelineError;
use crate::handle::ImageHandle;
use crate::inference::InferenceContext;
use crate::ops::{detection, InferenceTask, PixelFn, PlannedOperation, Transform};
use crate::types::{BoundingBox, SkippedOperation};

use super::source::SourceImage;

/// An image that has been through every planned operation.
#[derive(Debug, Clone)]
pub struct ExecutedImage {
    pub source: SourceImage,
    /// Final image, metadata already merged (or stripped)
    pub handle: ImageHandle,
    /// Format the sink encodes with
    pub format: OutputFormat,
    pub applied_operations: Vec<String>,
    pub skipped_operations: Vec<SkippedOperation>,
    pub detections: Option<Vec<BoundingBox>>,
}

/// Per-image state while the plan runs.
struct Job {
    source: SourceImage,
    current: ImageHandle,
    format: Option<OutputFormat>,
    applied: Vec<String>,
    skipped: Vec<SkippedOperation>,
    detections: Option<Vec<BoundingBox>>,
}

impl Job {
    fn new(source: SourceImage) -> Self {
        Self {
            current: source.handle.clone(),
            source,
            format: None,
            applied: Vec::new(),
            skipped: Vec::new(),
            detections: None,
        }
    }

    fn advance(&mut self, op: &PlannedOperation, handle: ImageHandle) {
        self.current = handle;
        if let Some(format) = op.params.output_format() {
            self.format = Some(format);
        }
        self.applied.push(op.name.to_string());
    }

    fn skip(&mut self, op: &PlannedOperation, error: PipelineError) {
        tracing::warn!(
            operation = op.name,
            path = ?self.source.path,
            "Operation skipped: {error}"
        );
        self.skipped.push(SkippedOperation {
            operation: op.name.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        });
    }
}

/// Runs a fixed plan against images.
pub struct Executor {
    plan: Vec<PlannedOperation>,
    inference: Arc<InferenceContext>,
    preserve_metadata: bool,
}

impl Executor {
    pub fn new(
        plan: Vec<PlannedOperation>,
        inference: Arc<InferenceContext>,
        preserve_metadata: bool,
    ) -> Self {
        Self {
            plan,
            inference,
            preserve_metadata,
        }
    }

    /// Run the plan on one image.
    pub async fn execute(&self, source: SourceImage) -> ExecutedImage {
        let mut jobs = [Job::new(source)];
        self.run(&mut jobs).await;
        let [job] = jobs;
        self.finish(job)
    }

    /// Run the plan on a chunk, returning results in input order.
    pub async fn execute_chunk(&self, sources: Vec<SourceImage>) -> Vec<ExecutedImage> {
        let mut jobs: Vec<Job> = sources.into_iter().map(Job::new).collect();
        self.run(&mut jobs).await;
        jobs.into_iter().map(|job| self.finish(job)).collect()
    }

    async fn run(&self, jobs: &mut [Job]) {
        if jobs.is_empty() {
            return;
        }
        for op in &self.plan {
            match op.transform {
                Transform::Pixel(f) => {
                    for job in jobs.iter_mut() {
                        apply_pixel(job, op, f).await;
                    }
                }
                Transform::Inference(task) => self.apply_inference(jobs, op, task).await,
            }
        }
    }

    async fn apply_inference(&self, jobs: &mut [Job], op: &PlannedOperation, task: InferenceTask) {
        let ctx = &self.inference;
        match task {
            InferenceTask::DetectFaces => {
                for job in jobs.iter_mut() {
                    match ctx.detect_faces(&job.current).await {
                        Ok(boxes) => {
                            tracing::debug!(
                                path = ?job.source.path,
                                faces = boxes.len(),
                                "Faces detected"
                            );
                            let outlined = detection::draw_boxes(&job.current, &boxes);
                            job.detections = Some(boxes);
                            job.advance(op, outlined);
                        }
                        Err(e) => job.skip(op, e),
                    }
                }
            }
            InferenceTask::RemoveBackground => {
                for job in jobs.iter_mut() {
                    match ctx.remove_background(&job.current).await {
                        Ok(handle) => job.advance(op, handle),
                        Err(e) => job.skip(op, e),
                    }
                }
            }
            InferenceTask::Enhance if ctx.batch_enhance() && jobs.len() > 1 => {
                let inputs: Vec<ImageHandle> = jobs.iter().map(|j| j.current.clone()).collect();
                match ctx.enhance_batch(&inputs).await {
                    Ok(outputs) => {
                        for (job, handle) in jobs.iter_mut().zip(outputs) {
                            job.advance(op, handle);
                        }
                    }
                    Err(e) => {
                        for job in jobs.iter_mut() {
                            job.skip(op, PipelineError::inference(task.name(), e.to_string()));
                        }
                    }
                }
            }
            InferenceTask::Enhance => {
                for job in jobs.iter_mut() {
                    match ctx.enhance(&job.current).await {
                        Ok(handle) => job.advance(op, handle),
                        Err(e) => job.skip(op, e),
                    }
                }
            }
        }
    }

    /// Final step: metadata, then the output format.
    fn finish(&self, job: Job) -> ExecutedImage {
        let mut handle = job.current;
        if self.preserve_metadata {
            handle.merge_metadata(job.source.handle.metadata());
        } else {
            handle.clear_metadata();
        }

        let format = job
            .format
            .or_else(|| job.source.output_format())
            .unwrap_or(OutputFormat::Png);

        tracing::debug!(
            path = ?job.source.path,
            applied = job.applied.len(),
            skipped = job.skipped.len(),
            "Pipeline finished"
        );

        ExecutedImage {
            source: job.source,
            handle,
            format,
            applied_operations: job.applied,
            skipped_operations: job.skipped,
            detections: job.detections,
        }
    }
}

async fn apply_pixel(job: &mut Job, op: &PlannedOperation, f: PixelFn) {
    let input = job.current.clone();
    let params = op.params.clone();
    let start = Instant::now();

    match tokio::task::spawn_blocking(move || f(&input, &params)).await {
        Ok(Ok(handle)) => {
            tracing::trace!(operation = op.name, "Applied in {:?}", start.elapsed());
            job.advance(op, handle);
        }
        Ok(Err(e)) => job.skip(op, e),
        Err(e) => job.skip(op, PipelineError::operation(op.name, join_failure(e))),
    }
}

fn join_failure(error: JoinError) -> String {
    if !error.is_panic() {
        return format!("transform task cancelled: {error}");
    }
    let payload = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("transform panicked: {message}")
}
