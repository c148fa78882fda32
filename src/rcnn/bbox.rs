use ndarray::Array2;

use crate::error::{Result, TargetError};

/// Axis-aligned box in absolute pixel coordinates.
///
/// Widths are `x2 - x1` (continuous coordinates), so a box with
/// `x1 == x2` has zero area and zero overlap with everything.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        BoundingBox { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x1 + 0.5 * self.width(), self.y1 + 0.5 * self.height())
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Rejects non-finite coordinates and inverted corners.
    pub fn validate(&self) -> Result<()> {
        if !self.to_array().iter().all(|v| v.is_finite()) {
            return Err(self.invalid("non-finite coordinate"));
        }
        if self.x2 < self.x1 || self.y2 < self.y1 {
            return Err(self.invalid("x2 < x1 or y2 < y1"));
        }
        Ok(())
    }

    fn require_positive_size(&self) -> Result<()> {
        if self.width() > 0.0 && self.height() > 0.0 {
            Ok(())
        } else {
            Err(self.invalid("width and height must be positive"))
        }
    }

    fn invalid(&self, reason: &'static str) -> TargetError {
        TargetError::InvalidBox {
            x1: self.x1,
            y1: self.y1,
            x2: self.x2,
            y2: self.y2,
            reason,
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        BoundingBox::new(v[0], v[1], v[2], v[3])
    }
}

/// Intersection over union of two boxes, 0 when the union is empty.
pub fn overlap(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let iw = a.x2.min(b.x2) - a.x1.max(b.x1);
    if iw <= 0.0 {
        return 0.0;
    }
    let ih = a.y2.min(b.y2) - a.y1.max(b.y1);
    if ih <= 0.0 {
        return 0.0;
    }
    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return 0.0;
    }
    (inter / union).clamp(0.0, 1.0)
}

/// Dense `[boxes × query_boxes]` IoU matrix.
pub fn bbox_overlaps(boxes: &[BoundingBox], query_boxes: &[BoundingBox]) -> Array2<f32> {
    let n = boxes.len();
    let k = query_boxes.len();
    let mut overlaps = Array2::<f32>::zeros((n, k));

    for (k_idx, query) in query_boxes.iter().enumerate() {
        for (n_idx, candidate) in boxes.iter().enumerate() {
            overlaps[(n_idx, k_idx)] = overlap(candidate, query);
        }
    }
    overlaps
}

/// Center-size deltas `(dx, dy, dw, dh)` that map `proposal` onto `target`.
pub fn encode_delta(proposal: &BoundingBox, target: &BoundingBox) -> Result<[f32; 4]> {
    proposal.require_positive_size()?;
    target.require_positive_size()?;

    let (ex_w, ex_h) = (proposal.width(), proposal.height());
    let (ex_cx, ex_cy) = proposal.center();
    let (gt_w, gt_h) = (target.width(), target.height());
    let (gt_cx, gt_cy) = target.center();

    Ok([
        (gt_cx - ex_cx) / ex_w,
        (gt_cy - ex_cy) / ex_h,
        (gt_w / ex_w).ln(),
        (gt_h / ex_h).ln(),
    ])
}

/// Applies deltas produced by [`encode_delta`] back onto `proposal`.
pub fn decode_delta(proposal: &BoundingBox, delta: &[f32; 4]) -> Result<BoundingBox> {
    proposal.require_positive_size()?;

    let (w, h) = (proposal.width(), proposal.height());
    let (cx, cy) = proposal.center();

    let pred_cx = delta[0] * w + cx;
    let pred_cy = delta[1] * h + cy;
    let pred_w = delta[2].exp() * w;
    let pred_h = delta[3].exp() * h;

    Ok(BoundingBox::new(
        pred_cx - 0.5 * pred_w,
        pred_cy - 0.5 * pred_h,
        pred_cx + 0.5 * pred_w,
        pred_cy + 0.5 * pred_h,
    ))
}
