//! Processing related to visual information.
//!
use std::path::Path;

use image::{io::Reader, RgbImage};

use crate::module::define;
use crate::module::error::{Error, Result};
use crate::module::model::EngineConfig;
use crate::module::util::conf;

pub mod detector;
pub mod geometry;
pub mod overlay;

use detector::{Detect, Detection};

/// Output of one prediction.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Sorted by descending score.
    pub detections: Vec<Detection>,
    /// Input scaled for display with the detections drawn on it.
    pub overlay: RgbImage,
}

impl Prediction {
    /// Class indices as floats, in detection order.
    pub fn pred_classes(&self) -> Vec<f64> {
        self.detections.iter().map(|d| d.cls as f64).collect()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.detections.iter().map(|d| d.prob as f64).collect()
    }

    /// `[x1, y1, x2, y2]` of every detection, concatenated.
    pub fn pred_boxes(&self) -> Vec<f64> {
        self.detections
            .iter()
            .flat_map(|d| d.bbox())
            .map(f64::from)
            .collect()
    }
}

/// Provide a means of image processing.
///
/// Owns the detection engine for the life of the process.
pub struct MutascanVision {
    pub det: Box<dyn Detect>,
}

/// MutascanVision's methods.
///
impl MutascanVision {
    pub fn new(det: Box<dyn Detect>) -> Self {
        Self { det }
    }

    /// Loads the model config (migrating it when configured) and builds the ONNX engine.
    ///
    /// A migrated config copy is deleted once the engine is up.
    pub fn from_conf(model: &conf::Model) -> Result<Self> {
        let cfg = EngineConfig::load(model)?;
        log::info!("Model config ready at {}", cfg.config_file.path().display());
        let det = detector::onnx::OnnxDetector::new(&cfg)?;
        Ok(Self::new(Box::new(det)))
    }

    /// Runs one forward pass over the image at `image_path` and renders the overlay.
    ///
    /// Reads the file and nothing else; persisting the overlay is up to the caller.
    pub fn predict(&self, image_path: &str) -> Result<Prediction> {
        let img = load_image(image_path)?;
        let mut detections = self.det.detect(&img)?;
        detections.sort_by(|a, b| b.prob.total_cmp(&a.prob));
        let overlay = overlay::render(&img, &detections, define::output::OVERLAY_SCALE);
        Ok(Prediction {
            detections,
            overlay,
        })
    }
}

/// Decodes the image at `path` as RGB.
pub fn load_image(path: &str) -> Result<RgbImage> {
    let decode_err = |reason: String| Error::ImageDecode {
        path: path.to_string(),
        reason,
    };
    if !Path::new(path).is_file() {
        return Err(decode_err("no such file".into()));
    }
    let img = Reader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;
    Ok(img.to_rgb8())
}
