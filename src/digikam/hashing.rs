//! Facts read from downloaded image bytes: the catalog hash and pixel size.

use md5::{Digest, Md5};

/// Hex MD5 of the image bytes, stored as `Images.uniqueHash`.
pub fn unique_hash(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Width and height read from the encoded image, if it can be decoded.
pub fn probe_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
