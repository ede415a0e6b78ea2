//! EXIF extraction into the handle's key-value metadata.

use exif::{In, Reader};
use std::io::Cursor;

use crate::handle::Metadata;

/// Reads EXIF tags from encoded image bytes.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// All primary-image EXIF fields as `tag name -> display value`.
    ///
    /// Lenient: files without EXIF, or with a broken EXIF block, yield an
    /// empty map.
    pub fn extract(bytes: &[u8]) -> Metadata {
        let mut metadata = Metadata::new();
        let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::trace!("No EXIF data: {e}");
                return metadata;
            }
        };

        for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
            let value = field.display_value().with_unit(&exif).to_string();
            let value = value.trim_matches('"').trim().to_string();
            if value.is_empty() {
                continue;
            }
            metadata.entry(field.tag.to_string()).or_insert(value);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_non_image() {
        assert!(MetadataExtractor::extract(b"not an image at all").is_empty());
    }

    #[test]
    fn test_extract_from_png_without_exif() {
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::new_rgb8(4, 4)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        assert!(MetadataExtractor::extract(buf.get_ref()).is_empty());
    }
}
