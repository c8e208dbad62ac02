use std::path::PathBuf;
use std::time::Duration;

/// Tile settings for inference on large images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingConfig {
    /// Edge length of a tile in input pixels. 0 disables tiling.
    pub tile: u32,
    /// Context pixels added around each tile and cropped after inference.
    pub pad: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self { tile: 400, pad: 10 }
    }
}

impl TilingConfig {
    pub fn needs_tiling(&self, width: u32, height: u32) -> bool {
        self.tile > 0 && (width > self.tile || height > self.tile)
    }
}

/// Runtime settings. Everything is compiled in; there is no config file.
#[derive(Debug, Clone)]
pub struct UpscalerConfig {
    pub models_dir: PathBuf,
    pub tiling: TilingConfig,
    pub download_timeout: Duration,
    pub user_agent: String,
    pub log_file: PathBuf,
    pub intra_threads: usize,
}

impl Default for UpscalerConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("./models"),
            tiling: TilingConfig::default(),
            download_timeout: Duration::from_secs(600),
            user_agent: format!("image-upscaler/{}", env!("CARGO_PKG_VERSION")),
            log_file: PathBuf::from("image_upscaler.log"),
            intra_threads: num_cpus::get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiling_kicks_in_above_tile_size() {
        let tiling = TilingConfig::default();
        assert!(!tiling.needs_tiling(400, 400));
        assert!(tiling.needs_tiling(401, 10));
        assert!(tiling.needs_tiling(10, 1200));
    }

    #[test]
    fn zero_tile_disables_tiling() {
        let tiling = TilingConfig { tile: 0, pad: 10 };
        assert!(!tiling.needs_tiling(10_000, 10_000));
    }

    #[test]
    fn defaults_point_at_local_model_cache() {
        let config = UpscalerConfig::default();
        assert_eq!(config.models_dir, PathBuf::from("./models"));
        assert!(config.intra_threads >= 1);
        assert!(config.user_agent.starts_with("image-upscaler/"));
    }
}
