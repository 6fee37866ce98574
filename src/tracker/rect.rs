use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box used for detections and zone geometry.
///
/// Stored as TLWH (top-left x, top-left y, width, height). On the wire a
/// `Rect` is a TLBR array `[x1, y1, x2, y2]`, which is what detectors and
/// zone files produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct Rect {
    /// Top-left x coordinate
    pub x: f32,
    /// Top-left y coordinate
    pub y: f32,
    /// Width of the bounding box
    pub width: f32,
    /// Height of the bounding box
    pub height: f32,
}

impl Rect {
    /// Create a new Rect from top-left coordinates and dimensions (TLWH format).
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a Rect from TLBR format (top-left x, top-left y, bottom-right x, bottom-right y).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    /// Convert to TLBR format: (x1, y1, x2, y2).
    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    /// Get the center point of the bounding box.
    #[inline]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Center point as a nalgebra point, used for centroid distances.
    #[inline]
    pub fn centroid(&self) -> Point2<f32> {
        let (cx, cy) = self.center();
        Point2::new(cx, cy)
    }

    /// Get the area of the bounding box.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// True when the rectangle has positive width and height.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Point containment, inclusive on every edge.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        let [x1, y1, x2, y2] = self.to_tlbr();
        x1 <= px && px <= x2 && y1 <= py && py <= y2
    }

    /// Grow the box by `pad` on each side and clamp it to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn padded_within(&self, pad: f32, width: u32, height: u32) -> Option<Rect> {
        let [x1, y1, x2, y2] = self.to_tlbr();
        let max_x = width.saturating_sub(1) as f32;
        let max_y = height.saturating_sub(1) as f32;
        let x1 = (x1 - pad).max(0.0);
        let y1 = (y1 - pad).max(0.0);
        let x2 = (x2 + pad).min(max_x);
        let y2 = (y2 + pad).min(max_y);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::from_tlbr(x1, y1, x2, y2))
    }
}

impl From<[f32; 4]> for Rect {
    fn from(tlbr: [f32; 4]) -> Self {
        Rect::from_tlbr(tlbr[0], tlbr[1], tlbr[2], tlbr[3])
    }
}

impl From<Rect> for [f32; 4] {
    fn from(rect: Rect) -> Self {
        rect.to_tlbr()
    }
}

/// Euclidean distance between the centers of two boxes.
pub fn centroid_distance(a: &Rect, b: &Rect) -> f32 {
    nalgebra::distance(&a.centroid(), &b.centroid())
}
