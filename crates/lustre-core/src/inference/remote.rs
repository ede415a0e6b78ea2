//! HTTP inference backend.
//!
//! Talks JSON to a model server. Images travel as base64-encoded PNG:
//!
//! | Endpoint                   | Request              | Response                 |
//! |----------------------------|----------------------|--------------------------|
//! | `GET  /health`             |                      | any 2xx                  |
//! | `POST /detect_faces`       | `{"image": b64}`     | `{"faces": [{x,y,width,height}]}` |
//! | `POST /remove_background`  | `{"image": b64}`     | `{"image": b64}`         |
//! | `POST /enhance`            | `{"image": b64}`     | `{"image": b64}`         |
//! | `POST /enhance_batch`      | `{"images": [b64]}`  | `{"images": [b64]}`      |

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

use super::InferenceBackend;
use crate::error::{PipelineError, PipelineResult};
use crate::handle::ImageHandle;
use crate::types::BoundingBox;

pub struct RemoteBackend {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ImageRequest {
    image: String,
}

#[derive(Serialize)]
struct BatchRequest {
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    image: String,
}

#[derive(Deserialize)]
struct BatchResponse {
    images: Vec<String>,
}

#[derive(Deserialize)]
struct FacesResponse {
    #[serde(default)]
    faces: Vec<BoundingBox>,
}

/// Encode an image as base64 PNG.
pub(crate) fn encode_image(task: &str, image: &DynamicImage) -> PipelineResult<String> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| PipelineError::inference(task, format!("Failed to encode image: {e}")))?;
    Ok(BASE64.encode(buffer.into_inner()))
}

/// Decode a base64 image returned by the server.
pub(crate) fn decode_image(task: &str, data: &str) -> PipelineResult<DynamicImage> {
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| PipelineError::inference(task, format!("Invalid base64 image: {e}")))?;
    image::load_from_memory(&bytes)
        .map_err(|e| PipelineError::inference(task, format!("Undecodable image in response: {e}")))
}

impl RemoteBackend {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        task: &str,
        body: &B,
    ) -> PipelineResult<R> {
        let url = format!("{}/{task}", self.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::inference(task, format!("Request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Inference {
                task: task.to_string(),
                message: format!("HTTP {status}: {text}"),
                status_code: Some(status.as_u16()),
            });
        }

        resp.json()
            .await
            .map_err(|e| PipelineError::inference(task, format!("Failed to parse response: {e}")))
    }

    async fn image_call(&self, task: &str, image: &ImageHandle) -> PipelineResult<ImageHandle> {
        let body = ImageRequest {
            image: encode_image(task, image.image())?,
        };
        let resp: ImageResponse = self.post(task, &body).await?;
        Ok(image.with_image(decode_image(task, &resp.image)?))
    }
}

#[async_trait]
impl InferenceBackend for RemoteBackend {
    fn name(&self) -> &str {
        "remote"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.endpoint);
        match self.client.get(&url).timeout(Duration::from_secs(5)).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn detect_faces(&self, image: &ImageHandle) -> PipelineResult<Vec<BoundingBox>> {
        let body = ImageRequest {
            image: encode_image("detect_faces", image.image())?,
        };
        let resp: FacesResponse = self.post("detect_faces", &body).await?;
        Ok(resp.faces)
    }

    async fn remove_background(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
        self.image_call("remove_background", image).await
    }

    async fn enhance(&self, image: &ImageHandle) -> PipelineResult<ImageHandle> {
        self.image_call("enhance", image).await
    }

    async fn enhance_batch(&self, images: &[ImageHandle]) -> PipelineResult<Vec<ImageHandle>> {
        let task = "enhance_batch";
        let body = BatchRequest {
            images: images
                .iter()
                .map(|h| encode_image(task, h.image()))
                .collect::<PipelineResult<_>>()?,
        };
        let resp: BatchResponse = self.post(task, &body).await?;
        if resp.images.len() != images.len() {
            return Err(PipelineError::inference(
                task,
                format!(
                    "Expected {} images in response, got {}",
                    images.len(),
                    resp.images.len()
                ),
            ));
        }

        images
            .iter()
            .zip(&resp.images)
            .map(|(handle, data)| Ok(handle.with_image(decode_image(task, data)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_base64_round_trip() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3])));
        let encoded = encode_image("enhance", &img).unwrap();
        let decoded = decode_image("enhance", &encoded).unwrap();
        assert_eq!(decoded.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image("enhance", "!!!not base64").unwrap_err();
        assert!(err.to_string().contains("Invalid base64"));
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        assert_eq!(RemoteBackend::new("http://host:9000/").endpoint(), "http://host:9000");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails() {
        // Port 9 (discard) on localhost is almost never listening.
        let backend = RemoteBackend::new("http://127.0.0.1:9");
        let image = ImageHandle::new(DynamicImage::new_rgb8(2, 2));
        let err = backend.enhance(&image).await.unwrap_err();
        assert_eq!(err.kind(), crate::types::FailureKind::Inference);
        assert!(!backend.is_available().await);
    }
}
