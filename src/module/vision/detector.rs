//! Provide Object Detection
//!
pub mod onnx {
    use crate::module::error::{Error, Result};
    use crate::module::model::{Device, EngineConfig};
    use image::{imageops::FilterType, Pixel, RgbImage};
    use ndarray::{s, Array, Axis, IxDyn};
    use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use std::sync::{Mutex, PoisonError};

    use super::{Detect, Detection};

    /// Same-class boxes overlapping at least this much are merged.
    const MERGE_IOU: f32 = 0.7;

    /// ONNX Runtime detection engine.
    ///
    /// Expects one output shaped `[1, 4 + classes, anchors]`: box center,
    /// size, then one score per class, in input pixel units.
    pub struct OnnxDetector {
        session: Mutex<Session>,
        imgsz: u32,
        score_threshold: f32,
    }

    impl OnnxDetector {
        /// Builds the session once from the engine config.
        pub fn new(cfg: &EngineConfig) -> Result<Self> {
            if !cfg.weights.is_file() {
                return Err(Error::Config(format!(
                    "weights not found at {}",
                    cfg.weights.display()
                )));
            }
            let provider = match cfg.device {
                Device::Cpu => CPUExecutionProvider::default().build(),
                Device::Cuda(id) => CUDAExecutionProvider::default()
                    .with_device_id(id as i32)
                    .build(),
            };
            let session = Session::builder()
                .map_err(setup_err)?
                .with_execution_providers([provider])
                .map_err(setup_err)?
                .with_optimization_level(GraphOptimizationLevel::Level1)
                .map_err(setup_err)?
                .with_intra_threads(4)
                .map_err(setup_err)?
                .commit_from_file(&cfg.weights)
                .map_err(setup_err)?;
            log::info!(
                "Loaded {} on {} (input {}px, threshold {})",
                cfg.weights.display(),
                cfg.device,
                cfg.input_size(),
                cfg.score_threshold
            );
            Ok(Self {
                session: Mutex::new(session),
                imgsz: cfg.input_size(),
                score_threshold: cfg.score_threshold,
            })
        }
    }

    fn setup_err(e: impl std::fmt::Display) -> Error {
        Error::Inference(format!("session setup: {}", e))
    }

    impl Detect for OnnxDetector {
        fn detect(&self, img: &RgbImage) -> Result<Vec<Detection>> {
            let sz = self.imgsz;
            let resized = image::imageops::resize(img, sz, sz, FilterType::Triangle);

            let array = Array::from_shape_fn((1, 3, sz as usize, sz as usize), |(_, c, j, i)| {
                let pixel = resized.get_pixel(i as u32, j as u32);
                // range [0, 255] -> range [0, 1]
                (pixel.channels()[c] as f32) / 255.0
            });
            let tensor = Tensor::from_array(array)?;

            // A panic in an earlier run leaves the session itself usable.
            let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
            let outs = session.run(ort::inputs![tensor])?;
            let out = outs[0].try_extract_array::<f32>()?.t().into_owned();

            let scale = (
                img.width() as f32 / sz as f32,
                img.height() as f32 / sz as f32,
            );
            let bounds = (img.width() as f32, img.height() as f32);
            convert_yolo_fmt(out, self.score_threshold, scale, bounds)
        }
    }

    /// Decodes the transposed `[anchors, 4 + classes, 1]` output.
    ///
    /// Boxes are rescaled by `scale` and clipped to `bounds`.
    pub(super) fn convert_yolo_fmt(
        out: Array<f32, IxDyn>,
        threshold: f32,
        scale: (f32, f32),
        bounds: (f32, f32),
    ) -> Result<Vec<Detection>> {
        if out.ndim() != 3 || out.shape()[1] <= 4 {
            return Err(Error::Inference(format!(
                "unexpected output shape {:?}",
                out.shape()
            )));
        }
        let (sx, sy) = scale;
        let (bw, bh) = bounds;
        let mut bboxes = vec![];
        let output = out.slice(s![.., .., 0]);
        for row in output.axis_iter(Axis(0)) {
            let row: Vec<_> = row.iter().copied().collect();
            let best = row
                .iter()
                .skip(4)
                .copied()
                .enumerate()
                .reduce(|accum, cand| if cand.1 > accum.1 { cand } else { accum });
            let Some((class_id, prob)) = best else {
                continue;
            };
            if prob < threshold {
                continue;
            }
            let (xc, yc, w, h) = (row[0], row[1], row[2], row[3]);
            bboxes.push(Detection {
                x1: ((xc - w / 2.0) * sx).clamp(0.0, bw),
                y1: ((yc - h / 2.0) * sy).clamp(0.0, bh),
                x2: ((xc + w / 2.0) * sx).clamp(0.0, bw),
                y2: ((yc + h / 2.0) * sy).clamp(0.0, bh),
                cls: class_id as u32,
                prob,
            })
        }
        bboxes.sort_by(|box1, box2| box2.prob.total_cmp(&box1.prob));
        Ok(merge_bboxes(bboxes))
    }

    /// Intersection over union of two boxes.
    fn iou(r1: &Detection, r2: &Detection) -> f32 {
        let x1 = r1.x1.max(r2.x1);
        let y1 = r1.y1.max(r2.y1);
        let x2 = r1.x2.min(r2.x2);
        let y2 = r1.y2.min(r2.y2);
        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = r1.area() + r2.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Merges same-class boxes whose IoU with a stronger box reaches [`MERGE_IOU`].
    ///
    /// Expects `bboxes` sorted by descending score; the merged box keeps the
    /// stronger score.
    fn merge_bboxes(bboxes: Vec<Detection>) -> Vec<Detection> {
        let mut merged_bboxes = Vec::new();
        let mut used = vec![false; bboxes.len()];
        for i in 0..bboxes.len() {
            if used[i] {
                continue;
            }
            let mut merged_bbox = bboxes[i].clone();
            used[i] = true;
            for j in 0..bboxes.len() {
                if used[j] || bboxes[i].cls != bboxes[j].cls {
                    continue;
                }
                if iou(&bboxes[i], &bboxes[j]) >= MERGE_IOU {
                    merged_bbox.x1 = merged_bbox.x1.min(bboxes[j].x1);
                    merged_bbox.y1 = merged_bbox.y1.min(bboxes[j].y1);
                    merged_bbox.x2 = merged_bbox.x2.max(bboxes[j].x2);
                    merged_bbox.y2 = merged_bbox.y2.max(bboxes[j].y2);
                    used[j] = true;
                }
            }
            merged_bboxes.push(merged_bbox);
        }
        merged_bboxes
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        /// Builds a transposed output from `(cx, cy, w, h, scores)` rows.
        fn output(rows: &[[f32; 7]]) -> Array<f32, IxDyn> {
            Array::from_shape_fn((rows.len(), 7, 1), |(a, k, _)| rows[a][k]).into_dyn()
        }

        #[test]
        fn decodes_and_thresholds() {
            let out = output(&[
                [50.0, 50.0, 20.0, 10.0, 0.1, 0.9, 0.0],
                [10.0, 10.0, 4.0, 4.0, 0.3, 0.2, 0.1],
            ]);
            let dets = convert_yolo_fmt(out, 0.85, (2.0, 1.0), (1000.0, 1000.0)).unwrap();
            assert_eq!(dets.len(), 1);
            let d = &dets[0];
            assert_eq!(d.cls, 1);
            assert_eq!(d.prob, 0.9);
            assert_eq!((d.x1, d.y1, d.x2, d.y2), (80.0, 45.0, 120.0, 55.0));
        }

        #[test]
        fn clips_to_image() {
            let out = output(&[[2.0, 2.0, 10.0, 10.0, 0.95, 0.0, 0.0]]);
            let dets = convert_yolo_fmt(out, 0.5, (1.0, 1.0), (5.0, 5.0)).unwrap();
            assert_eq!((dets[0].x1, dets[0].y1, dets[0].x2, dets[0].y2), (0.0, 0.0, 5.0, 5.0));
        }

        #[test]
        fn merges_overlapping_same_class() {
            let out = output(&[
                [50.0, 50.0, 20.0, 20.0, 0.0, 0.0, 0.90],
                [51.0, 50.0, 20.0, 20.0, 0.0, 0.0, 0.95],
                [51.0, 50.0, 20.0, 20.0, 0.0, 0.88, 0.0],
                [150.0, 150.0, 20.0, 20.0, 0.0, 0.0, 0.86],
            ]);
            let dets = convert_yolo_fmt(out, 0.85, (1.0, 1.0), (500.0, 500.0)).unwrap();
            assert_eq!(dets.len(), 3);
            assert_eq!(dets[0].prob, 0.95);
            assert_eq!((dets[0].x1, dets[0].x2), (40.0, 61.0));
            assert_eq!(dets[1].cls, 1);
            assert_eq!(dets[2].prob, 0.86);
        }

        #[test]
        fn rejects_bad_shape() {
            let out = Array::<f32, _>::zeros((3, 4)).into_dyn();
            assert!(convert_yolo_fmt(out, 0.5, (1.0, 1.0), (1.0, 1.0)).is_err());
        }
    }
}

use image::RgbImage;

use crate::module::error::Result;

/// An inference engine: maps an image to the detections scoring at least
/// its configured threshold.
pub trait Detect: Send {
    fn detect(&self, img: &RgbImage) -> Result<Vec<Detection>>;
}

/// The model's classes. The index order is what clients map back to labels.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutascanClasses {
    /// None / negative
    N,
    /// Mutant
    MT,
    /// Wild type
    WT,
}

/// Labels in class index order.
pub const LABELS: [&str; 3] = ["N", "MT", "WT"];

/// Convert int to MutascanClasses
///
impl MutascanClasses {
    pub fn from_u32(i: u32) -> Option<MutascanClasses> {
        match i {
            0 => Some(MutascanClasses::N),
            1 => Some(MutascanClasses::MT),
            2 => Some(MutascanClasses::WT),
            _ => None,
        }
    }
    pub fn to_u32(&self) -> u32 {
        match self {
            MutascanClasses::N => 0,
            MutascanClasses::MT => 1,
            MutascanClasses::WT => 2,
        }
    }
    pub fn label(&self) -> &'static str {
        LABELS[self.to_u32() as usize]
    }
}

/// Detection result
///
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub cls: u32,
    pub prob: f32,
}

impl Detection {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
    /// `[x1, y1, x2, y2]`
    pub fn bbox(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
    /// Label for the class, or the bare index for unknown classes.
    pub fn label(&self) -> String {
        match MutascanClasses::from_u32(self.cls) {
            Some(c) => c.label().to_string(),
            None => self.cls.to_string(),
        }
    }
}
