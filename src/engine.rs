//! The super-resolution boundary: an ONNX Runtime session wrapped behind a
//! small trait, with tiling for large inputs.

use std::sync::OnceLock;

use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::{TilingConfig, UpscalerConfig};
use crate::error::{Result, UpscaleError};
use crate::model::ModelInfo;

/// A model that enlarges an image by its native factor.
pub trait SuperResolution: Send {
    fn native_scale(&self) -> u32;

    /// Output must be exactly `native_scale()` times the input in both
    /// dimensions.
    fn enhance(&mut self, image: &RgbImage) -> Result<RgbImage>;
}

/// Produces a ready-to-run engine for a catalog entry.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model: &ModelInfo) -> Result<Box<dyn SuperResolution>>;
}

pub struct OnnxLoader {
    config: UpscalerConfig,
}

impl OnnxLoader {
    pub fn new(config: UpscalerConfig) -> Self {
        Self { config }
    }
}

fn init_runtime() -> Result<()> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    INIT.get_or_init(|| {
        info!("Initializing ONNX Runtime...");
        ort::init()
            .with_name("image_upscaler")
            .commit()
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .clone()
    .map_err(UpscaleError::Model)
}

impl ModelLoader for OnnxLoader {
    fn load(&self, model: &ModelInfo) -> Result<Box<dyn SuperResolution>> {
        let model_path = model.ensure_downloaded(&self.config)?;
        init_runtime()?;

        info!("Creating ONNX session from {}", model_path.display());
        let session = Session::builder()
            .map_err(UpscaleError::model)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(UpscaleError::model)?
            .with_intra_threads(self.config.intra_threads)
            .map_err(UpscaleError::model)?
            .commit_from_file(&model_path)
            .map_err(|e| {
                UpscaleError::model(format!(
                    "Failed to load model from {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        Ok(Box::new(OnnxEngine {
            session,
            scale: model.scale,
            tiling: self.config.tiling,
        }))
    }
}

/// Real-ESRGAN running in ONNX Runtime. NCHW, RGB, values in [0, 1].
pub struct OnnxEngine {
    session: Session,
    scale: u32,
    tiling: TilingConfig,
}

impl OnnxEngine {
    fn infer(&mut self, image: &RgbImage) -> Result<RgbImage> {
        // The 2x network unshuffles pixels and needs even dimensions.
        let multiple = if self.scale == 2 { 2 } else { 1 };
        let (padded, (pad_r, pad_b)) = pad_to_multiple(image, multiple);

        let input_tensor = image_to_tensor(&padded)?;
        let input_value = Tensor::from_array(input_tensor).map_err(UpscaleError::model)?;

        let input_name = self.session.inputs[0].name.to_string();
        let output_name = self.session.outputs[0].name.to_string();

        let outputs = self
            .session
            .run(ort::inputs![input_name.as_str() => input_value])
            .map_err(|e| UpscaleError::model(format!("Inference failed: {}", e)))?;

        let (output_shape, output_data) = outputs[output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| UpscaleError::model(format!("Failed to extract tensor: {}", e)))?;
        let shape_vec = output_shape.as_ref().to_vec();
        debug!("Output tensor shape: {:?}", shape_vec);

        let mut out = tensor_to_image(&shape_vec, output_data)?;

        let (w, h) = image.dimensions();
        if pad_r > 0 || pad_b > 0 {
            out = imageops::crop_imm(&out, 0, 0, w * self.scale, h * self.scale).to_image();
        }
        Ok(out)
    }
}

impl SuperResolution for OnnxEngine {
    fn native_scale(&self) -> u32 {
        self.scale
    }

    fn enhance(&mut self, image: &RgbImage) -> Result<RgbImage> {
        let (w, h) = image.dimensions();
        let scale = self.scale;
        let tiling = self.tiling;

        let out = if tiling.needs_tiling(w, h) {
            debug!("Tiling {}x{} with tile {} pad {}", w, h, tiling.tile, tiling.pad);
            upscale_tiled(image, scale, tiling, |tile| self.infer(tile))?
        } else {
            self.infer(image)?
        };

        if out.dimensions() != (w * scale, h * scale) {
            return Err(UpscaleError::model(format!(
                "Model produced {}x{}, expected {}x{}",
                out.width(),
                out.height(),
                w * scale,
                h * scale
            )));
        }
        Ok(out)
    }
}

/// Runs `infer` over overlapping tiles and stitches the results. Each tile
/// is read with `pad` pixels of context that are dropped again after
/// upscaling so seams do not show.
pub fn upscale_tiled<F>(
    image: &RgbImage,
    scale: u32,
    tiling: TilingConfig,
    mut infer: F,
) -> Result<RgbImage>
where
    F: FnMut(&RgbImage) -> Result<RgbImage>,
{
    let (w, h) = image.dimensions();
    let mut canvas = RgbImage::new(w * scale, h * scale);
    let tile = tiling.tile.max(1);

    let mut y0 = 0;
    while y0 < h {
        let y1 = (y0 + tile).min(h);
        let y0p = y0.saturating_sub(tiling.pad);
        let y1p = (y1 + tiling.pad).min(h);

        let mut x0 = 0;
        while x0 < w {
            let x1 = (x0 + tile).min(w);
            let x0p = x0.saturating_sub(tiling.pad);
            let x1p = (x1 + tiling.pad).min(w);

            let patch = imageops::crop_imm(image, x0p, y0p, x1p - x0p, y1p - y0p).to_image();
            let upscaled = infer(&patch)?;

            let expected = ((x1p - x0p) * scale, (y1p - y0p) * scale);
            if upscaled.dimensions() != expected {
                return Err(UpscaleError::model(format!(
                    "Tile at ({}, {}) came back {}x{}, expected {}x{}",
                    x0,
                    y0,
                    upscaled.width(),
                    upscaled.height(),
                    expected.0,
                    expected.1
                )));
            }

            let inner = imageops::crop_imm(
                &upscaled,
                (x0 - x0p) * scale,
                (y0 - y0p) * scale,
                (x1 - x0) * scale,
                (y1 - y0) * scale,
            )
            .to_image();
            imageops::replace(&mut canvas, &inner, (x0 * scale) as i64, (y0 * scale) as i64);

            x0 = x1;
        }
        y0 = y1;
    }

    Ok(canvas)
}

/// Pads right and bottom up to a multiple by mirroring edge pixels.
/// Returns the padded image and the amount added on each side.
fn pad_to_multiple(img: &RgbImage, multiple: u32) -> (RgbImage, (u32, u32)) {
    let (w, h) = img.dimensions();
    let pad_w = w.div_ceil(multiple) * multiple;
    let pad_h = h.div_ceil(multiple) * multiple;
    let pad_r = pad_w - w;
    let pad_b = pad_h - h;

    if pad_r == 0 && pad_b == 0 {
        return (img.clone(), (0, 0));
    }

    let padded = RgbImage::from_fn(pad_w, pad_h, |x, y| {
        let src_x = if x < w { x } else { w - 1 - (x - w).min(w - 1) };
        let src_y = if y < h { y } else { h - 1 - (y - h).min(h - 1) };
        *img.get_pixel(src_x, src_y)
    });

    (padded, (pad_r, pad_b))
}

fn image_to_tensor(img: &RgbImage) -> Result<Array4<f32>> {
    let (w, h) = img.dimensions();
    let raw = img.as_raw();

    // Planar R, G, B
    let data: Vec<f32> = (0..3usize)
        .into_par_iter()
        .flat_map_iter(|c| raw.chunks_exact(3).map(move |p| p[c] as f32 / 255.0))
        .collect();

    Array4::from_shape_vec((1, 3, h as usize, w as usize), data).map_err(UpscaleError::model)
}

fn tensor_to_image(shape: &[i64], data: &[f32]) -> Result<RgbImage> {
    if shape.len() != 4 || shape[1] != 3 || shape[2] <= 0 || shape[3] <= 0 {
        return Err(UpscaleError::model(format!(
            "Unexpected output tensor shape {:?}",
            shape
        )));
    }

    let (h, w) = (shape[2] as usize, shape[3] as usize);
    let plane = h * w;
    if data.len() < 3 * plane {
        return Err(UpscaleError::model(format!(
            "Output tensor holds {} values, shape {:?} needs {}",
            data.len(),
            shape,
            3 * plane
        )));
    }

    let raw: Vec<u8> = (0..plane)
        .into_par_iter()
        .flat_map_iter(|i| (0..3).map(move |c| to_u8(data[c * plane + i])))
        .collect();

    RgbImage::from_raw(w as u32, h as u32, raw)
        .ok_or_else(|| UpscaleError::model("Output buffer does not match its dimensions"))
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}


#[cfg(test)]
mod tests {
    use super::testing::repeat_pixels;
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]))
    }

    #[test]
    fn tiled_result_matches_whole_image_result() {
        let image = gradient(57, 43);
        let tiling = TilingConfig { tile: 16, pad: 3 };

        let mut calls = 0;
        let tiled = upscale_tiled(&image, 4, tiling, |tile| {
            calls += 1;
            Ok(repeat_pixels(tile, 4))
        })
        .unwrap();

        assert_eq!(tiled.dimensions(), (228, 172));
        assert_eq!(tiled, repeat_pixels(&image, 4));
        // ceil(57/16) * ceil(43/16)
        assert_eq!(calls, 4 * 3);
    }

    #[test]
    fn tiles_include_context_padding() {
        let image = gradient(40, 40);
        let tiling = TilingConfig { tile: 20, pad: 5 };

        let mut sizes = Vec::new();
        upscale_tiled(&image, 2, tiling, |tile| {
            sizes.push(tile.dimensions());
            Ok(repeat_pixels(tile, 2))
        })
        .unwrap();

        assert_eq!(sizes, vec![(25, 25), (25, 25), (25, 25), (25, 25)]);
    }

    #[test]
    fn wrong_tile_size_from_model_is_an_error() {
        let image = gradient(30, 30);
        let tiling = TilingConfig { tile: 10, pad: 2 };
        let err = upscale_tiled(&image, 4, tiling, |tile| Ok(repeat_pixels(tile, 2))).unwrap_err();
        assert!(matches!(err, UpscaleError::Model(_)));
    }

    #[test]
    fn odd_sizes_are_padded_by_mirroring() {
        let image = gradient(5, 3);
        let (padded, pads) = pad_to_multiple(&image, 2);
        assert_eq!(padded.dimensions(), (6, 4));
        assert_eq!(pads, (1, 1));
        assert_eq!(padded.get_pixel(5, 0), image.get_pixel(4, 0));
        assert_eq!(padded.get_pixel(0, 3), image.get_pixel(0, 2));

        let (same, pads) = pad_to_multiple(&image, 1);
        assert_eq!(same, image);
        assert_eq!(pads, (0, 0));
    }

    #[test]
    fn tensor_layout_is_planar_rgb() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 51, 255]));

        let tensor = image_to_tensor(&image).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 1]], 0.2);
        assert_eq!(tensor[[0, 2, 0, 1]], 1.0);
        assert_eq!(tensor[[0, 2, 0, 0]], 0.0);
    }

    #[test]
    fn output_values_are_clamped() {
        // R plane, G plane, B plane for a 1x2 image
        let data = [1.5, 0.5, -0.2, 0.0, 1.0, 0.2];
        let image = tensor_to_image(&[1, 3, 1, 2], &data).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([255, 0, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([128, 0, 51]));
    }

    #[test]
    fn malformed_output_shapes_are_rejected() {
        assert!(tensor_to_image(&[1, 1, 2, 2], &[0.0; 4]).is_err());
        assert!(tensor_to_image(&[1, 3, 2, 2], &[0.0; 6]).is_err());
        assert!(tensor_to_image(&[3, 2, 2], &[0.0; 12]).is_err());
    }
}
