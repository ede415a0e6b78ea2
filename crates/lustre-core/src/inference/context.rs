//! Shared, bounded access to the inference backend for one batch run.
//!
//! The context is created when a batch starts and closed when it ends. All
//! workers share it: a semaphore caps calls in flight, each call has a
//! timeout, and transient failures are retried with exponential backoff.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::{retry, InferenceBackend};
use crate::config::InferenceConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::handle::ImageHandle;
use crate::ops::InferenceTask;
use crate::types::BoundingBox;

pub struct InferenceContext {
    backend: Arc<dyn InferenceBackend>,
    semaphore: Semaphore,
    timeout: Duration,
    retry_attempts: u32,
    retry_delay_ms: u64,
    batch_enhance: bool,
}

impl InferenceContext {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: &InferenceConfig) -> Self {
        tracing::debug!(
            backend = backend.name(),
            max_concurrent = config.max_concurrent,
            timeout_ms = config.timeout_ms,
            "Opening inference context"
        );
        Self {
            backend,
            semaphore: Semaphore::new(config.max_concurrent.max(1)),
            timeout: Duration::from_millis(config.timeout_ms),
            retry_attempts: config.retry_attempts,
            retry_delay_ms: config.retry_delay_ms,
            batch_enhance: config.batch_enhance,
        }
    }

    /// Whether a chunk's enhance step should use one batched call.
    pub fn batch_enhance(&self) -> bool {
        self.batch_enhance
    }

    /// Reject all further calls. Calls already holding a permit finish.
    pub fn close(&self) {
        if !self.semaphore.is_closed() {
            tracing::debug!(backend = self.backend.name(), "Closing inference context");
            self.semaphore.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    async fn call<T, F, Fut>(&self, task: &str, op: F) -> PipelineResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| PipelineError::inference(task, "inference context is closed"))?;

        let mut last_error = None;
        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                let delay = retry::backoff_duration(attempt - 1, self.retry_delay_ms);
                let attempts = self.retry_attempts;
                tracing::debug!("Retry {attempt}/{attempts} for {task} after {delay:?}");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => {
                    let retryable = retry::is_retryable(&e);
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
                Err(_) => {
                    last_error = Some(PipelineError::inference(
                        task,
                        format!("timed out after {}ms", self.timeout.as_millis()),
                    ));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PipelineError::inference(task, "no attempts made")))
    }

    pub async fn detect_faces(&self, image: &ImageHandle) -> PipelineResult<Vec<BoundingBox>> {
        self.call(InferenceTask::DetectFaces.name(), || self.backend.detect_faces(image))
            .await
    }

    pub async fn remove_background(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
        self.call(InferenceTask::RemoveBackground.name(), || {
            self.backend.remove_background(image)
        })
        .await
    }

    pub async fn enhance(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
        self.call(InferenceTask::Enhance.name(), || self.backend.enhance(image))
            .await
    }

    /// One batched call for a whole chunk; the result has one image per input.
    pub async fn enhance_batch(&self, images: &[ImageHandle]) -> PipelineResult<Vec<ImageHandle>> {
        let out = self
            .call("enhance_batch", || self.backend.enhance_batch(images))
            .await?;
        if out.len() != images.len() {
            return Err(PipelineError::inference(
                "enhance_batch",
                format!("backend returned {} images for {}", out.len(), images.len()),
            ));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::DisabledBackend;
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with a 503 for the first `failures` calls, then succeeds.
    struct FlakyBackend {
        failures: u32,
        calls: AtomicU32,
        in_flight: AtomicU32,
        max_in_flight: AtomicU32,
        delay: Duration,
    }

    impl FlakyBackend {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                in_flight: AtomicU32::new(0),
                max_in_flight: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl InferenceBackend for FlakyBackend {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn detect_faces(&self, _image: &ImageHandle) -> PipelineResult<Vec<BoundingBox>> {
            Ok(vec![BoundingBox::new(1, 1, 2, 2)])
        }

        async fn remove_background(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
            Ok(image.clone())
        }

        async fn enhance(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(PipelineError::Inference {
                    task: "enhance".into(),
                    message: "HTTP 503".into(),
                    status_code: Some(503),
                });
            }
            Ok(image.clone())
        }
    }

    fn config(retry_attempts: u32) -> InferenceConfig {
        InferenceConfig {
            retry_attempts,
            retry_delay_ms: 1,
            timeout_ms: 1_000,
            ..Default::default()
        }
    }

    fn image() -> ImageHandle {
        ImageHandle::new(DynamicImage::new_rgb8(2, 2))
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let backend = Arc::new(FlakyBackend::new(2));
        let ctx = InferenceContext::new(backend.clone(), &config(2));
        assert!(ctx.enhance(&image()).await.is_ok());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let backend = Arc::new(FlakyBackend::new(10));
        let ctx = InferenceContext::new(backend.clone(), &config(1));
        let err = ctx.enhance(&image()).await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let ctx = InferenceContext::new(Arc::new(DisabledBackend), &config(5));
        let err = ctx.detect_faces(&image()).await.unwrap_err();
        assert!(err.to_string().contains("no inference backend"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let mut backend = FlakyBackend::new(0);
        backend.delay = Duration::from_millis(200);
        let ctx = InferenceContext::new(
            Arc::new(backend),
            &InferenceConfig {
                timeout_ms: 10,
                retry_attempts: 0,
                ..Default::default()
            },
        );
        let err = ctx.enhance(&image()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_semaphore_serializes_calls() {
        let mut backend = FlakyBackend::new(0);
        backend.delay = Duration::from_millis(20);
        let backend = Arc::new(backend);
        let ctx = Arc::new(InferenceContext::new(backend.clone(), &config(0)));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(async move { ctx.enhance(&image()).await.is_ok() }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_context_rejects_calls() {
        let ctx = InferenceContext::new(Arc::new(FlakyBackend::new(0)), &config(0));
        ctx.close();
        assert!(ctx.is_closed());
        let err = ctx.enhance(&image()).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn test_default_batch_enhance_is_sequential() {
        let backend = Arc::new(FlakyBackend::new(0));
        let ctx = InferenceContext::new(backend.clone(), &config(0));
        let out = ctx.enhance_batch(&[image(), image(), image()]).await.unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }
}
