use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{Result, UpscaleError};

/// Filters offered by the save dialog, in order.
pub const SAVE_FILTERS: [(&str, &[&str]); 3] = [
    ("PNG Files", &["png"]),
    ("JPEG Files", &["jpg"]),
    ("All Files", &["*"]),
];

/// Copies the upscaled file byte-for-byte to `destination`.
pub fn save_copy(output: &Path, destination: &Path) -> Result<u64> {
    // fs::copy onto itself would truncate the file first.
    if let (Ok(a), Ok(b)) = (output.canonicalize(), destination.canonicalize()) {
        if a == b {
            let len = fs::metadata(&a)
                .map_err(|source| UpscaleError::Save {
                    path: destination.to_path_buf(),
                    source,
                })?
                .len();
            return Ok(len);
        }
    }

    let bytes = fs::copy(output, destination).map_err(|source| UpscaleError::Save {
        path: destination.to_path_buf(),
        source,
    })?;
    info!("Saved {} bytes to {}", bytes, destination.display());
    Ok(bytes)
}
