use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong between picking a file and saving the result.
#[derive(Debug, Error)]
pub enum UpscaleError {
    /// Input file missing or not readable as an image.
    #[error("Could not load image {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// Weight download, session creation or inference failed.
    #[error("Model error: {0}")]
    Model(String),

    /// The upscaled image could not be written.
    #[error("Could not write {}: {reason}", .path.display())]
    Encode { path: PathBuf, reason: String },

    /// Copying the result to the user's destination failed.
    #[error("Failed to save image to {}: {source}", .path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("An upscale job is already running")]
    Busy,
}

impl UpscaleError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn model(reason: impl ToString) -> Self {
        Self::Model(reason.to_string())
    }

    pub fn encode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Encode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<anyhow::Error> for UpscaleError {
    fn from(e: anyhow::Error) -> Self {
        // {:#} keeps the whole context chain on one line
        Self::Model(format!("{:#}", e))
    }
}

pub type Result<T, E = UpscaleError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn anyhow_context_is_kept_in_model_errors() {
        let err = Err::<(), _>(anyhow::anyhow!("HTTP 404"))
            .context("Failed to download RealESRGAN-4x")
            .unwrap_err();
        let err = UpscaleError::from(err);
        assert_eq!(
            err.to_string(),
            "Model error: Failed to download RealESRGAN-4x: HTTP 404"
        );
    }

    #[test]
    fn decode_message_names_the_file() {
        let err = UpscaleError::decode("/tmp/missing.png", "No such file");
        assert!(err.to_string().contains("missing.png"));
        assert!(err.to_string().contains("No such file"));
    }
}
