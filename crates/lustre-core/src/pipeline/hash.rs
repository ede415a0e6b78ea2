//! Content and perceptual hashing.

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};

/// BLAKE3 content hashes and a cached perceptual hasher.
pub struct Hasher {
    phash_hasher: image_hasher::Hasher,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    pub fn new() -> Self {
        let phash_hasher = HasherConfig::new()
            .hash_alg(HashAlg::DoubleGradient)
            .hash_size(16, 16)
            .to_hasher();
        Self { phash_hasher }
    }

    /// Hex BLAKE3 digest of the file bytes.
    pub fn content_hash(data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }

    /// Base64 perceptual hash; similar images give nearby hashes.
    pub fn perceptual_hash(&self, image: &DynamicImage) -> String {
        self.phash_hasher.hash_image(image).to_base64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = Hasher::content_hash(b"lustre");
        assert_eq!(a, Hasher::content_hash(b"lustre"));
        assert_ne!(a, Hasher::content_hash(b"lustre!"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_perceptual_hash_ignores_scale() {
        let hasher = Hasher::new();
        let small = DynamicImage::new_rgb8(64, 64);
        let large = DynamicImage::new_rgb8(256, 256);
        assert_eq!(hasher.perceptual_hash(&small), hasher.perceptual_hash(&large));
    }
}
