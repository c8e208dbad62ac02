//! Model catalog and the local weight cache.
//!
//! Weights are ONNX exports of Real-ESRGAN. A variant is downloaded the first
//! time it is needed and read from `models_dir` afterwards.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::config::UpscalerConfig;
use crate::job::ScaleFactor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: &'static str,
    pub url: &'static str,
    /// Factor the network was trained for.
    pub scale: u32,
    pub description: &'static str,
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({}x)", self.name, self.description, self.scale)
    }
}

pub const REALESRGAN_X2: ModelInfo = ModelInfo {
    name: "RealESRGAN-2x",
    url: "https://huggingface.co/TensorStack/Upscale-amuse/resolve/main/RealESRGAN-2x/model.onnx",
    scale: 2,
    description: "Real-world SR (2x)",
};

pub const REALESRGAN_X4: ModelInfo = ModelInfo {
    name: "RealESRGAN-4x",
    url: "https://huggingface.co/TensorStack/Upscale-amuse/resolve/main/RealESRGAN-4x/model.onnx",
    scale: 4,
    description: "Real-world SR (4x)",
};

impl ModelInfo {
    /// The native model that serves a requested factor.
    pub fn for_scale(scale: ScaleFactor) -> &'static ModelInfo {
        match scale.native_scale() {
            2 => &REALESRGAN_X2,
            _ => &REALESRGAN_X4,
        }
    }

    pub fn cache_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(format!("{}.onnx", self.name))
    }

    /// Returns the cached weight file, downloading it first if needed.
    pub fn ensure_downloaded(&self, config: &UpscalerConfig) -> Result<PathBuf> {
        let path = self.cache_path(&config.models_dir);
        if path.is_file() {
            return Ok(path);
        }

        info!("Model not found locally, downloading: {}", self.name);
        download_model(self.url, &path, config)
            .with_context(|| format!("Failed to download model {}", self.name))?;
        info!("Model downloaded successfully");

        Ok(path)
    }
}

fn download_model(url: &str, path: &Path, config: &UpscalerConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let client = reqwest::blocking::Client::builder()
        .timeout(config.download_timeout)
        .user_agent(config.user_agent.as_str())
        .build()?;

    info!("Downloading from: {}", url);
    let mut resp = client.get(url).send()?;

    if !resp.status().is_success() {
        return Err(anyhow!("HTTP {} for {}", resp.status(), url));
    }

    // A half-written file must never look like a cached model.
    let tmp = path.with_extension("part");
    let mut out = fs::File::create(&tmp)?;
    io::copy(&mut resp, &mut out)?;
    drop(out);

    fs::rename(&tmp, path)?;
    info!("Model saved to: {}", path.display());

    Ok(())
}
