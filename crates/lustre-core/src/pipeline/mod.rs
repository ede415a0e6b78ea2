//! Image processing pipeline components.
//!
//! Stages, in the order an image meets them:
//! - **discovery**: find candidate files in the input directory
//! - **validate**: size and magic-byte checks before decoding
//! - **decode**: decode on the blocking pool with a timeout
//! - **metadata**: extract EXIF tags into the image handle
//! - **hash**: content and perceptual hashes
//! - **source**: ties the above into `enumerate` / `load`
//! - **executor**: apply the planned operations with skip-and-continue
//! - **naming** / **sink**: name and write outputs
//! - **scheduler** / **progress**: chunked, bounded batch execution

pub mod decode;
pub mod discovery;
pub mod executor;
pub mod hash;
pub mod metadata;
pub mod naming;
pub mod progress;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod validate;

// Re-exports for convenient access
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use executor::{ExecutedImage, Executor};
pub use hash::Hasher;
pub use metadata::MetadataExtractor;
pub use naming::NamingTemplate;
pub use progress::{BatchProgress, ProgressSnapshot, StopSignal};
pub use scheduler::{BatchScheduler, BatchSummary};
pub use sink::OutputSink;
pub use source::{ImageSource, SourceImage};
pub use validate::Validator;
