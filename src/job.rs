use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, UpscaleError};

/// Extensions accepted by the drop target and the browse dialog.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tiff", "webp"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleFactor {
    #[default]
    X2,
    X3,
    X4,
}

impl ScaleFactor {
    pub const ALL: [ScaleFactor; 3] = [ScaleFactor::X2, ScaleFactor::X3, ScaleFactor::X4];

    pub fn factor(self) -> u32 {
        match self {
            ScaleFactor::X2 => 2,
            ScaleFactor::X3 => 3,
            ScaleFactor::X4 => 4,
        }
    }

    /// Maps a raw multiplier onto a supported factor. Anything that is not
    /// 2 or 3 runs the 4x plan.
    pub fn from_factor(factor: u32) -> Self {
        match factor {
            2 => ScaleFactor::X2,
            3 => ScaleFactor::X3,
            _ => ScaleFactor::X4,
        }
    }

    /// Scale of the model that has to run for this factor.
    pub fn native_scale(self) -> u32 {
        match self {
            ScaleFactor::X2 => 2,
            ScaleFactor::X3 | ScaleFactor::X4 => 4,
        }
    }

    /// No 3x model exists, so 3x is produced by resampling the 4x result.
    pub fn needs_resample(self) -> bool {
        self.native_scale() != self.factor()
    }

    pub fn target_dims(self, (w, h): (u32, u32)) -> (u32, u32) {
        (w * self.factor(), h * self.factor())
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.factor())
    }
}

/// `{dir}/{stem}_upscaled_{N}x{ext}` next to the input.
pub fn derive_output_path(input: &Path, scale: ScaleFactor) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let mut name = format!("{}_upscaled_{}", stem, scale);
    if let Some(ext) = input.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }

    input.with_file_name(name)
}

/// A user-selected image that passed the extension and existence checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    path: PathBuf,
}

impl InputImage {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !is_image_file(&path) {
            return Err(UpscaleError::Unsupported(path));
        }
        if !path.is_file() {
            return Err(UpscaleError::NotFound(path));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One unit of work handed to the background runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpscaleJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub scale: ScaleFactor,
}

impl UpscaleJob {
    pub fn new(input: &InputImage, scale: ScaleFactor) -> Self {
        Self {
            input_path: input.path().to_path_buf(),
            output_path: derive_output_path(input.path(), scale),
            scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_for_photo_jpg_at_4x() {
        let out = derive_output_path(Path::new("/pics/photo.jpg"), ScaleFactor::X4);
        assert_eq!(out, PathBuf::from("/pics/photo_upscaled_4x.jpg"));
    }

    #[test]
    fn output_path_keeps_extension_case_and_handles_missing_extension() {
        let out = derive_output_path(Path::new("shots/IMG_01.PNG"), ScaleFactor::X3);
        assert_eq!(out, PathBuf::from("shots/IMG_01_upscaled_3x.PNG"));

        let out = derive_output_path(Path::new("shots/scan"), ScaleFactor::X2);
        assert_eq!(out, PathBuf::from("shots/scan_upscaled_2x"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(is_image_file(Path::new("a.PNG")));
        assert!(is_image_file(Path::new("a.Jpeg")));
        assert!(is_image_file(Path::new("a.tiff")));
        assert!(is_image_file(Path::new("a.webp")));
        assert!(!is_image_file(Path::new("a.gif")));
        assert!(!is_image_file(Path::new("a.tif")));
        assert!(!is_image_file(Path::new("png")));
    }

    #[test]
    fn unknown_factors_fall_back_to_4x() {
        assert_eq!(ScaleFactor::from_factor(2), ScaleFactor::X2);
        assert_eq!(ScaleFactor::from_factor(3), ScaleFactor::X3);
        assert_eq!(ScaleFactor::from_factor(4), ScaleFactor::X4);
        assert_eq!(ScaleFactor::from_factor(8), ScaleFactor::X4);
        assert_eq!(ScaleFactor::from_factor(0), ScaleFactor::X4);
    }

    #[test]
    fn only_3x_needs_resampling() {
        assert!(!ScaleFactor::X2.needs_resample());
        assert!(ScaleFactor::X3.needs_resample());
        assert!(!ScaleFactor::X4.needs_resample());
        assert_eq!(ScaleFactor::X3.native_scale(), 4);
        assert_eq!(ScaleFactor::X3.target_dims((10, 7)), (30, 21));
    }

    #[test]
    fn labels_match_the_selector() {
        let labels: Vec<String> = ScaleFactor::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(labels, ["2x", "3x", "4x"]);
    }

    #[test]
    fn input_image_rejects_missing_and_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("nope.png");
        assert!(matches!(InputImage::new(&missing), Err(UpscaleError::NotFound(_))));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        assert!(matches!(InputImage::new(&text), Err(UpscaleError::Unsupported(_))));

        let png = dir.path().join("ok.png");
        std::fs::write(&png, b"not really a png").unwrap();
        let input = InputImage::new(&png).unwrap();
        assert_eq!(input.file_name(), "ok.png");
    }

    #[test]
    fn job_derives_its_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("cat.png");
        std::fs::write(&png, b"x").unwrap();

        let job = UpscaleJob::new(&InputImage::new(&png).unwrap(), ScaleFactor::X2);
        assert_eq!(job.output_path, dir.path().join("cat_upscaled_2x.png"));
        assert_eq!(job.scale, ScaleFactor::X2);
    }
}
