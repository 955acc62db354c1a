//! Content hashing for query deduplication.

use blake3::Hasher as Blake3Hasher;
use image::DynamicImage;

/// BLAKE3 digests used as the content half of every cache key.
pub struct Hasher;

impl Hasher {
    /// Hash a sequence of byte slices as one stream.
    ///
    /// This is the resolver-level content hash; every cache key goes through it.
    pub fn content_hash(parts: &[&[u8]]) -> String {
        let mut hasher = Blake3Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Hash the decoded pixels of an image.
    ///
    /// The digest covers dimensions, color type and raw pixel bytes, so the
    /// same picture stored under two paths hashes identically while two
    /// images that merely share a byte buffer do not.
    pub fn pixel_hash(image: &DynamicImage) -> String {
        let color = format!("{:?}", image.color());
        Self::content_hash(&[
            &image.width().to_le_bytes(),
            &image.height().to_le_bytes(),
            color.as_bytes(),
            image.as_bytes(),
        ])
    }
}
