//! Destination paths for imported images.
//!
//! Album paths mirror the Piwigo category hierarchy:
//! ```text
//! /Collection/
//! ├── digikam4.db
//! ├── Holidays/
//! │   └── Rome/
//! │       ├── IMG_0001.jpg
//! │       └── IMG_0001_1.jpg
//! └── Uncategorized/
//!     └── image_42.jpg
//! ```

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Album used when the category path is empty.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Longest file name or album segment kept, in UTF-8 bytes, extension
/// included. Leaves room for a `_999` suffix under the usual 255-byte limit.
pub const MAX_FILE_NAME_BYTES: usize = 200;

/// Highest `_N` suffix tried before giving up on a name.
pub const MAX_COLLISION_SUFFIX: u32 = 999;

const DEFAULT_EXTENSION: &str = "jpg";

/// Characters rejected by at least one common file system.
fn is_invalid_char(c: char) -> bool {
    c.is_control() || matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
}

fn replace_invalid(s: &str) -> String {
    s.chars()
        .map(|c| if is_invalid_char(c) { '_' } else { c })
        .collect()
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character.
fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Turn a Piwigo category path (`"A / B"`) into a relative album path (`"A/B"`).
///
/// Segments are sanitized one by one, so a name can never introduce an extra
/// directory level or step outside the collection.
pub fn album_relative_path(category_path: &str) -> String {
    let segments: Vec<String> = category_path
        .replace(" / ", "/")
        .replace('\\', "/")
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "." | ".." => "_".to_string(),
            _ => truncate_bytes(&replace_invalid(s), MAX_FILE_NAME_BYTES)
                .trim_end()
                .to_string(),
        })
        .collect();

    if segments.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        segments.join("/")
    }
}

/// digiKam stores album paths relative to the root with a leading slash.
pub fn album_catalog_path(relative_path: &str) -> String {
    format!("/{}", relative_path.trim_start_matches('/'))
}

/// Make a file name safe to write: replace invalid characters, default the
/// extension to `.jpg` and cap the length while keeping the extension.
pub fn sanitize_file_name(file_name: &str) -> String {
    let file_name = file_name.trim();
    if file_name.is_empty() {
        return format!("unnamed.{}", DEFAULT_EXTENSION);
    }

    let mut name = replace_invalid(file_name);
    if matches!(name.as_str(), "." | "..") {
        name = "_".to_string();
    }

    if Path::new(&name).extension().is_none() {
        name = format!("{}.{}", name, DEFAULT_EXTENSION);
    }

    if name.len() > MAX_FILE_NAME_BYTES {
        let ext = Path::new(&name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        name = if ext.len() <= MAX_FILE_NAME_BYTES / 2 {
            let stem = &name[..name.len() - ext.len()];
            format!("{}{}", truncate_bytes(stem, MAX_FILE_NAME_BYTES - ext.len()), ext)
        } else {
            truncate_bytes(&name, MAX_FILE_NAME_BYTES).to_string()
        };
    }

    name
}

/// Name to use for an image: the stored file name, else `image_<id>.jpg`.
pub fn image_file_name(file: &str, id: i64) -> String {
    if file.trim().is_empty() {
        sanitize_file_name(&format!("image_{}.{}", id, DEFAULT_EXTENSION))
    } else {
        sanitize_file_name(file)
    }
}

/// Upper-cased extension, as digiKam records the format (`JPG`, `PNG`).
pub fn format_from_name(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}

/// Write `data` to `dir/file_name`, or to the first free `stem_N.ext` when the
/// name is taken. The file is created exclusively, so an existing file is never
/// overwritten.
pub fn write_unique(dir: &Path, file_name: &str, data: &[u8]) -> Result<PathBuf> {
    let base = Path::new(file_name);
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let ext = base
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for suffix in 0..=MAX_COLLISION_SUFFIX {
        let candidate = if suffix == 0 {
            dir.join(file_name)
        } else {
            dir.join(format!("{}_{}{}", stem, suffix, ext))
        };

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::filesystem(candidate, e)),
        };

        file.write_all(data)
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::filesystem(&candidate, e))?;
        return Ok(candidate);
    }

    Err(Error::NameConflicts(dir.join(file_name)))
}
