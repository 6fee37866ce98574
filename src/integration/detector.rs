//! Traits for the external capabilities the pipeline consumes: object
//! detection and code (QR) decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tracker::{Detection, Rect};

/// One video frame as raw bytes plus its dimensions.
///
/// The byte layout is whatever the attached detector and code reader agree on.
#[derive(Debug, Clone, Copy)]
pub struct FrameImage<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
}

impl<'a> FrameImage<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }
}

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the pipeline.
///
/// # Example
///
/// ```ignore
/// use zonetrack_rs::integration::DetectionSource;
/// use zonetrack_rs::tracker::Detection;
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl DetectionSource for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, input: &[u8], width: u32, height: u32) -> Result<Vec<Detection>, Self::Error> {
///         Ok(vec![Detection::new("spool", 10.0, 10.0, 60.0, 60.0, 0.9)])
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for detection failures.
    type Error;

    /// Run inference on raw image data and return labeled detections.
    ///
    /// # Arguments
    /// * `input` - Raw image bytes (format depends on implementation)
    /// * `width` - Image width in pixels
    /// * `height` - Image height in pixels
    fn detect(
        &mut self,
        input: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<Detection>, Self::Error>;
}

/// Decodes a code (QR or similar) inside a region of a frame.
pub trait CodeReader: Send {
    /// Raw decoded text of the code inside `roi`, if any.
    fn decode(&mut self, image: &FrameImage<'_>, roi: Rect) -> Option<String>;
}

impl std::fmt::Debug for dyn CodeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CodeReader")
    }
}

/// Structured payload printed on inventory labels.
///
/// Encoded as compact JSON: `{"type": "filament", "id": "FIL-PLA-RED-001", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodePayload {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A decoded code: raw text plus its payload when the text parses.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCode {
    pub raw: String,
    pub payload: Option<CodePayload>,
}

impl DecodedCode {
    /// Trim `raw` and try it as a JSON payload. Blank input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let payload = serde_json::from_str::<CodePayload>(raw)
            .ok()
            .filter(|p| !p.id.trim().is_empty());
        Some(Self {
            raw: raw.to_string(),
            payload,
        })
    }

    /// Object id usable as an identity hint.
    pub fn object_id(&self) -> Option<&str> {
        self.payload.as_ref().map(|p| p.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_payload() {
        let code = DecodedCode::parse(
            r#" {"type":"filament","id":"FIL-PLA-RED-001","name":"Red PLA","color":"red"} "#,
        )
        .unwrap();
        let payload = code.payload.as_ref().unwrap();
        assert_eq!(payload.kind, "filament");
        assert_eq!(payload.name.as_deref(), Some("Red PLA"));
        assert_eq!(payload.extra["color"], "red");
        assert_eq!(code.object_id(), Some("FIL-PLA-RED-001"));
    }

    #[test]
    fn test_plain_text_has_no_hint() {
        let code = DecodedCode::parse("hello").unwrap();
        assert_eq!(code.raw, "hello");
        assert_eq!(code.object_id(), None);
        assert!(DecodedCode::parse("   ").is_none());
    }

    #[test]
    fn test_blank_id_has_no_hint() {
        let code = DecodedCode::parse(r#"{"type":"printer","id":""}"#).unwrap();
        assert!(code.payload.is_none());
    }
}
