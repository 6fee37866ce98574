//! Integration module connecting detection and code-reading backends with
//! the zone tracker, and pipeline output with the inventory service.

mod builder;
mod detector;
mod pipeline;
mod sink;

pub use builder::DetectionBuilder;
pub use detector::{CodePayload, CodeReader, DecodedCode, DetectionSource, FrameImage};
pub use pipeline::{CODE_ROI_PADDING, FramePipeline, FrameReport, publish_signals};
pub use sink::SignalSink;

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};
