//! Inference backends for model-driven operations.
//!
//! Face detection, background removal and AI enhancement are delegated to an
//! [`InferenceBackend`]. No model ships with Lustre: the default backend is
//! [`DisabledBackend`], whose calls all fail so the dependent operations are
//! skipped, and [`RemoteBackend`] forwards images to an HTTP service.
//! Every call goes through an [`InferenceContext`], which bounds concurrency
//! and applies timeouts and retries.

pub mod context;
pub mod remote;
pub mod retry;

pub use context::InferenceContext;
pub use remote::RemoteBackend;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::InferenceConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::handle::ImageHandle;
use crate::types::BoundingBox;

/// A source of model inference.
///
/// Uses `async_trait` so the backend can live behind `Arc<dyn InferenceBackend>`.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend name for logs and `lustre version`.
    fn name(&self) -> &str;

    /// Whether the backend is configured and reachable.
    async fn is_available(&self) -> bool;

    async fn detect_faces(&self, image: &ImageHandle) -> PipelineResult<Vec<BoundingBox>>;

    async fn remove_background(&self, image: &ImageHandle) -> PipelineResult<ImageHandle>;

    async fn enhance(&self, image: &ImageHandle) -> PipelineResult<ImageHandle>;

    /// Enhance several images in one call. Must return one image per input,
    /// in input order. The default calls [`enhance`](Self::enhance) in turn.
    async fn enhance_batch(&self, images: &[ImageHandle]) -> PipelineResult<Vec<ImageHandle>> {
        let mut out = Vec::with_capacity(images.len());
        for image in images {
            out.push(self.enhance(image).await?);
        }
        Ok(out)
    }
}

/// Backend used when no inference endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledBackend;

impl DisabledBackend {
    fn unavailable(task: &str) -> PipelineError {
        PipelineError::inference(task, "no inference backend configured")
    }
}

#[async_trait]
impl InferenceBackend for DisabledBackend {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn is_available(&self) -> bool {
        false
    }

    async fn detect_faces(&self, _image: &ImageHandle) -> PipelineResult<Vec<BoundingBox>> {
        Err(Self::unavailable("detect_faces"))
    }

    async fn remove_background(&self, _image: &ImageHandle) -> PipelineResult<ImageHandle> {
        Err(Self::unavailable("remove_background"))
    }

    async fn enhance(&self, _image: &ImageHandle) -> PipelineResult<ImageHandle> {
        Err(Self::unavailable("enhance"))
    }

    async fn enhance_batch(&self, _images: &[ImageHandle]) -> PipelineResult<Vec<ImageHandle>> {
        Err(Self::unavailable("enhance_batch"))
    }
}

/// Pick the backend described by `config`.
pub fn backend_from_config(config: &InferenceConfig) -> Arc<dyn InferenceBackend> {
    match config.endpoint.as_deref().map(str::trim) {
        Some(endpoint) if !endpoint.is_empty() => {
            tracing::debug!("Using remote inference backend at {endpoint}");
            Arc::new(RemoteBackend::new(endpoint))
        }
        _ => Arc::new(DisabledBackend),
    }
}
