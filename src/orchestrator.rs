use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView};
use tracing::info;

use crate::engine::ModelLoader;
use crate::error::{Result, UpscaleError};
use crate::job::{derive_output_path, ScaleFactor, UpscaleJob};
use crate::model::ModelInfo;

/// Fixed points in a job where progress is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Milestone {
    Started,
    Decoded,
    ModelLoaded,
    InferenceStarted,
    InferenceComplete,
    /// Only reached on the 3x path.
    Resampled,
    Encoded,
}

impl Milestone {
    pub fn percent(self) -> u8 {
        match self {
            Milestone::Started => 5,
            Milestone::Decoded => 15,
            Milestone::ModelLoaded => 25,
            Milestone::InferenceStarted => 40,
            Milestone::InferenceComplete => 70,
            Milestone::Resampled => 80,
            Milestone::Encoded => 100,
        }
    }
}

/// Decodes, runs the right native model, resamples for 3x and writes the
/// result.
#[derive(Clone)]
pub struct Upscaler {
    loader: Arc<dyn ModelLoader>,
}

impl Upscaler {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self { loader }
    }

    /// Upscales `input` into its derived sibling path and returns that path.
    pub fn upscale_file(
        &self,
        input: &Path,
        scale: ScaleFactor,
        progress: impl FnMut(Milestone),
    ) -> Result<PathBuf> {
        let job = UpscaleJob {
            input_path: input.to_path_buf(),
            output_path: derive_output_path(input, scale),
            scale,
        };
        self.upscale(&job, progress)
    }

    pub fn upscale(&self, job: &UpscaleJob, mut progress: impl FnMut(Milestone)) -> Result<PathBuf> {
        info!("=== Processing: {} ({}) ===", job.input_path.display(), job.scale);
        let start = Instant::now();
        progress(Milestone::Started);

        // Decode first so a bad input never triggers a model download.
        let img = image::open(&job.input_path)
            .map_err(|e| UpscaleError::decode(&job.input_path, e))?;
        let (orig_w, orig_h) = img.dimensions();
        info!("Original image size: {}x{}", orig_w, orig_h);
        let rgb = img.into_rgb8();
        progress(Milestone::Decoded);

        let model = ModelInfo::for_scale(job.scale);
        info!("Model: {}", model);
        let mut engine = self.loader.load(model)?;
        progress(Milestone::ModelLoaded);

        info!("Running inference...");
        progress(Milestone::InferenceStarted);
        let mut output = engine.enhance(&rgb)?;
        progress(Milestone::InferenceComplete);

        let (target_w, target_h) = job.scale.target_dims((orig_w, orig_h));
        if job.scale.needs_resample() {
            info!(
                "Resampling {}x{} down to {}x{}",
                output.width(),
                output.height(),
                target_w,
                target_h
            );
            output = imageops::resize(&output, target_w, target_h, FilterType::Lanczos3);
            progress(Milestone::Resampled);
        }

        if output.dimensions() != (target_w, target_h) {
            return Err(UpscaleError::model(format!(
                "Result is {}x{}, expected {}x{}",
                output.width(),
                output.height(),
                target_w,
                target_h
            )));
        }

        info!("Saving to: {}", job.output_path.display());
        DynamicImage::ImageRgb8(output)
            .save(&job.output_path)
            .map_err(|e| UpscaleError::encode(&job.output_path, e))?;
        progress(Milestone::Encoded);

        info!("Completed in {:.2}s", start.elapsed().as_secs_f32());
        Ok(job.output_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FailingLoader, RepeatLoader};
    use image::{Rgb, RgbImage};

    fn write_image(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 128]))
            .save(&path)
            .unwrap();
        path
    }

    fn run(upscaler: &Upscaler, input: &Path, scale: ScaleFactor) -> (Result<PathBuf>, Vec<u8>) {
        let mut seen = Vec::new();
        let result = upscaler.upscale_file(input, scale, |m| seen.push(m.percent()));
        (result, seen)
    }

    #[test]
    fn ten_by_ten_at_2x_is_twenty_by_twenty() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_image(dir.path(), "small.png", 10, 10);
        let upscaler = Upscaler::new(Arc::new(RepeatLoader::default()));

        let (result, _) = run(&upscaler, &input, ScaleFactor::X2);
        let output = result.unwrap();

        assert_eq!(output, dir.path().join("small_upscaled_2x.png"));
        let decoded = image::open(&output).unwrap();
        assert_eq!(decoded.dimensions(), (20, 20));
    }

    #[test]
    fn native_factors_multiply_dimensions_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_image(dir.path(), "wide.png", 13, 7);
        let upscaler = Upscaler::new(Arc::new(RepeatLoader::default()));

        for scale in [ScaleFactor::X2, ScaleFactor::X4] {
            let output = run(&upscaler, &input, scale).0.unwrap();
            let f = scale.factor();
            assert_eq!(image::open(&output).unwrap().dimensions(), (13 * f, 7 * f));
        }
    }

    #[test]
    fn three_x_runs_the_4x_model_then_resamples() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_image(dir.path(), "odd.png", 11, 5);
        let loader = Arc::new(RepeatLoader::default());
        let upscaler = Upscaler::new(loader.clone());

        let (result, seen) = run(&upscaler, &input, ScaleFactor::X3);
        let output = result.unwrap();

        assert_eq!(image::open(&output).unwrap().dimensions(), (33, 15));
        assert_eq!(*loader.loaded.lock().unwrap(), vec!["RealESRGAN-4x"]);
        assert!(seen.contains(&Milestone::Resampled.percent()));
    }

    #[test]
    fn progress_is_non_decreasing_and_ends_at_100() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_image(dir.path(), "p.png", 4, 4);
        let upscaler = Upscaler::new(Arc::new(RepeatLoader::default()));

        for scale in ScaleFactor::ALL {
            let (result, seen) = run(&upscaler, &input, scale);
            result.unwrap();
            assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
            assert_eq!(seen.last(), Some(&100));
        }
    }

    #[test]
    fn missing_input_is_a_decode_error_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ghost.png");
        let loader = Arc::new(RepeatLoader::default());
        let upscaler = Upscaler::new(loader.clone());

        let (result, seen) = run(&upscaler, &input, ScaleFactor::X2);

        assert!(matches!(result, Err(UpscaleError::Decode { .. })));
        assert!(!dir.path().join("ghost_upscaled_2x.png").exists());
        assert!(loader.loaded.lock().unwrap().is_empty());
        assert!(!seen.contains(&100));
    }

    #[test]
    fn garbage_input_is_a_decode_error_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.jpg");
        std::fs::write(&input, b"definitely not a jpeg").unwrap();
        let upscaler = Upscaler::new(Arc::new(RepeatLoader::default()));

        let (result, _) = run(&upscaler, &input, ScaleFactor::X4);

        assert!(matches!(result, Err(UpscaleError::Decode { .. })));
        assert!(!dir.path().join("broken_upscaled_4x.jpg").exists());
    }

    #[test]
    fn model_failure_is_reported_and_never_reaches_100() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_image(dir.path(), "m.png", 4, 4);
        let upscaler = Upscaler::new(Arc::new(FailingLoader));

        let (result, seen) = run(&upscaler, &input, ScaleFactor::X4);

        let err = result.unwrap_err();
        assert!(matches!(err, UpscaleError::Model(_)));
        assert!(err.to_string().contains("out of memory"));
        assert_eq!(seen, vec![5, 15]);
    }

    #[test]
    fn unwritable_output_is_an_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_image(dir.path(), "e.png", 4, 4);
        let upscaler = Upscaler::new(Arc::new(RepeatLoader::default()));
        let job = UpscaleJob {
            input_path: input,
            output_path: dir.path().join("no-such-dir").join("e_upscaled_2x.png"),
            scale: ScaleFactor::X2,
        };

        let err = upscaler.upscale(&job, |_| {}).unwrap_err();
        assert!(matches!(err, UpscaleError::Encode { .. }));
    }

    #[test]
    fn rerunning_overwrites_the_same_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_image(dir.path(), "again.png", 6, 6);
        let upscaler = Upscaler::new(Arc::new(RepeatLoader::default()));

        let first = run(&upscaler, &input, ScaleFactor::X2).0.unwrap();
        let second = run(&upscaler, &input, ScaleFactor::X2).0.unwrap();
        assert_eq!(first, second);
        assert_eq!(image::open(&second).unwrap().dimensions(), (12, 12));
    }
}
