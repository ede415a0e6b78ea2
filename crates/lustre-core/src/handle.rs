//! The in-memory image carried through the pipeline.

use image::{ColorType, DynamicImage};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key-value metadata carried from the source file (EXIF-like tags).
pub type Metadata = BTreeMap<String, String>;

/// Channel layout and depth of a decoded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub channels: u8,
    pub bits_per_channel: u8,
}

impl From<ColorType> for PixelFormat {
    fn from(color: ColorType) -> Self {
        let channels = color.channel_count();
        let bits_per_channel = (color.bits_per_pixel() / channels.max(1) as u16) as u8;
        Self {
            channels,
            bits_per_channel,
        }
    }
}

/// A decoded image plus its metadata.
///
/// The raster sits behind an `Arc`, so cloning a handle is cheap. Transforms
/// never mutate a handle they are given; they build a new one with
/// [`ImageHandle::with_image`], which leaves the input usable by the
/// executor's skip-and-continue path.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    image: Arc<DynamicImage>,
    metadata: Metadata,
}

impl ImageHandle {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(image: DynamicImage, metadata: Metadata) -> Self {
        Self {
            image: Arc::new(image),
            metadata,
        }
    }

    /// A new handle holding `image` and this handle's metadata.
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
            metadata: self.metadata.clone(),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.image.color().into()
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn clear_metadata(&mut self) {
        self.metadata.clear();
    }

    /// Copy `original` onto this handle's metadata.
    ///
    /// Keys missing here are added; keys present in both take the value from
    /// `original`.
    pub fn merge_metadata(&mut self, original: &Metadata) {
        for (key, value) in original {
            self.metadata.insert(key.clone(), value.clone());
        }
    }
}
