//! Burn inference backend for object detection.
//!
//! `BurnDetector` wraps any model implementing [`BurnModel`] and exposes it
//! as a [`DetectionSource`], mapping class ids to the labels the pipeline
//! filters and tracks by.
//!
//! # Example
//!
//! ```ignore
//! use zonetrack_rs::integration::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let detector = BurnDetector::new(MyYoloModel::load("model.bin"), Default::default())
//!     .with_labels(["spool", "printer", "person"]);
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use thiserror::Error;

use super::{DetectionBuilder, DetectionSource};
use crate::tracker::Detection;

/// Label given to detections whose class id has no configured name.
pub const UNKNOWN_LABEL: &str = "object";

#[derive(Debug, Clone, Error)]
pub enum BurnDetectorError {
    #[error("invalid input dimensions: expected {expected:?}, got {got:?}")]
    InvalidInputDimensions {
        expected: (u32, u32, u32),
        got: (u32, u32, u32),
    },

    #[error("preprocessing error: {0}")]
    Preprocessing(String),

    #[error("inference error: {0}")]
    Inference(String),
}

/// Raw detection output from the model before filtering.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Bounding box: [x1, y1, x2, y2] or [cx, cy, w, h] depending on model
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: Option<usize>,
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on an input tensor of shape [batch, channels, height, width].
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 640, 640)
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true
    }
}

pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
    conf_threshold: f32,
    labels: Vec<String>,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            conf_threshold: 0.25,
            labels: Vec::new(),
        }
    }

    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    /// Class names indexed by class id.
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    fn label_for(&self, class_id: Option<usize>) -> &str {
        class_id
            .and_then(|id| self.labels.get(id))
            .map_or(UNKNOWN_LABEL, String::as_str)
    }

    /// Convert raw image bytes (CHW, u8) to a normalized [1, C, H, W] tensor.
    pub fn preprocess(
        &self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        let expected_len = (width * height * channels) as usize;

        if input.len() != expected_len {
            return Err(BurnDetectorError::InvalidInputDimensions {
                expected: (channels, height, width),
                got: (channels, height, input.len() as u32 / (height * channels).max(1)),
            });
        }
        if height != target_h || width != target_w {
            return Err(BurnDetectorError::Preprocessing(format!(
                "input size {width}x{height} doesn't match model size {target_w}x{target_h}"
            )));
        }

        let data: Vec<f32> = input.iter().map(|&x| x as f32 / 255.0).collect();
        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            channels as usize,
            height as usize,
            width as usize,
        ]))
    }

    fn postprocess(&self, raw_detections: Vec<RawDetection>) -> Vec<Detection> {
        raw_detections
            .into_iter()
            .filter(|d| d.score >= self.conf_threshold)
            .map(|d| {
                let builder = DetectionBuilder::new()
                    .label(self.label_for(d.class_id))
                    .confidence(d.score);
                let [a, b, c, e] = d.bbox;
                if self.model.bbox_is_xywh() {
                    builder.xywh(a, b, c, e).build()
                } else {
                    builder.tlbr(a, b, c, e).build()
                }
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> DetectionSource for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error> {
        let tensor = self.preprocess(input, width, height)?;
        let raw_detections = self.model.forward(tensor);
        Ok(self.postprocess(raw_detections))
    }
}
