use ndarray::{concatenate, Array1, Array2, Axis};

use crate::error::{Result, TargetError};
use crate::processing::bbox_regression::expand_bbox_regression_targets;
use crate::rcnn::bbox::BoundingBox;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    pub batch_index: usize,
    pub bbox: BoundingBox,
}

impl Proposal {
    pub fn new(batch_index: usize, bbox: BoundingBox) -> Self {
        Proposal { batch_index, bbox }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundTruthBox {
    pub bbox: BoundingBox,
    /// 0 is background.
    pub class: usize,
    pub pose: i64,
}

impl GroundTruthBox {
    pub fn new(bbox: BoundingBox, class: usize, pose: i64) -> Self {
        GroundTruthBox { bbox, class, pose }
    }

    /// Zero-area rows are what callers pad fixed-capacity inputs with.
    pub fn is_padding(&self) -> bool {
        self.bbox.area() <= 0.0
    }
}

/// Sampled RoIs with their supervision, one row per RoI.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingBatch {
    /// `[N × 5]`: batch index, x1, y1, x2, y2.
    pub rois: Array2<f32>,
    pub labels: Array1<usize>,
    pub poses: Array1<i64>,
    /// `[N × 4]` normalized deltas, zero for background.
    pub bbox_targets: Array2<f32>,
    pub bbox_inside_weights: Array2<f32>,
    pub bbox_outside_weights: Array2<f32>,
}

impl TrainingBatch {
    pub fn empty() -> Self {
        TrainingBatch {
            rois: Array2::zeros((0, 5)),
            labels: Array1::zeros(0),
            poses: Array1::zeros(0),
            bbox_targets: Array2::zeros((0, 4)),
            bbox_inside_weights: Array2::zeros((0, 4)),
            bbox_outside_weights: Array2::zeros((0, 4)),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_foreground(&self) -> usize {
        self.labels.iter().filter(|&&l| l > 0).count()
    }

    pub fn roi_box(&self, index: usize) -> BoundingBox {
        let row = self.rois.row(index);
        BoundingBox::new(row[1], row[2], row[3], row[4])
    }

    /// Stacks per-image batches along the RoI axis, in order.
    pub fn concat(batches: &[TrainingBatch]) -> Result<TrainingBatch> {
        if batches.is_empty() {
            return Ok(TrainingBatch::empty());
        }
        let rois: Vec<_> = batches.iter().map(|b| b.rois.view()).collect();
        let labels: Vec<_> = batches.iter().map(|b| b.labels.view()).collect();
        let poses: Vec<_> = batches.iter().map(|b| b.poses.view()).collect();
        let targets: Vec<_> = batches.iter().map(|b| b.bbox_targets.view()).collect();
        let inside: Vec<_> = batches.iter().map(|b| b.bbox_inside_weights.view()).collect();
        let outside: Vec<_> = batches.iter().map(|b| b.bbox_outside_weights.view()).collect();

        Ok(TrainingBatch {
            rois: concatenate(Axis(0), &rois)?,
            labels: concatenate(Axis(0), &labels)?,
            poses: concatenate(Axis(0), &poses)?,
            bbox_targets: concatenate(Axis(0), &targets)?,
            bbox_inside_weights: concatenate(Axis(0), &inside)?,
            bbox_outside_weights: concatenate(Axis(0), &outside)?,
        })
    }

    /// Class-specific `[N × 4K]` targets and inside weights.
    pub fn class_specific_targets(&self, num_classes: usize) -> Result<(Array2<f32>, Array2<f32>)> {
        if self.bbox_targets.nrows() != self.labels.len() {
            return Err(TargetError::ShapeMismatch {
                expected: self.labels.len(),
                actual: self.bbox_targets.nrows(),
            });
        }
        expand_bbox_regression_targets(
            &self.bbox_targets,
            &self.labels,
            num_classes,
            &self.bbox_inside_weights,
        )
    }
}
