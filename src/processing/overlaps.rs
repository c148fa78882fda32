use ndarray::{Array1, Array2};

use crate::error::{Result, TargetError};
use crate::rcnn::bbox::{bbox_overlaps, BoundingBox};
use crate::rcnn::roi::{GroundTruthBox, Proposal};

/// Best ground-truth match of every candidate RoI.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub max_overlaps: Array1<f32>,
    pub gt_assignment: Array1<usize>,
}

impl Assignment {
    pub fn len(&self) -> usize {
        self.max_overlaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_overlaps.is_empty()
    }
}

/// Drops zero-area ground-truth rows used to pad fixed-capacity inputs.
pub fn strip_padding(ground_truth: &[GroundTruthBox]) -> Vec<GroundTruthBox> {
    let kept: Vec<GroundTruthBox> = ground_truth
        .iter()
        .filter(|gt| !gt.is_padding())
        .copied()
        .collect();
    if kept.len() < ground_truth.len() {
        log::trace!(
            "dropped {} padded ground-truth rows",
            ground_truth.len() - kept.len()
        );
    }
    kept
}

/// Includes the ground-truth boxes in the set of candidate RoIs.
pub fn append_ground_truth(
    proposals: &[Proposal],
    ground_truth: &[GroundTruthBox],
    batch_index: usize,
) -> Vec<Proposal> {
    let mut all_rois = Vec::with_capacity(proposals.len() + ground_truth.len());
    all_rois.extend_from_slice(proposals);
    all_rois.extend(
        ground_truth
            .iter()
            .map(|gt| Proposal::new(batch_index, gt.bbox)),
    );
    all_rois
}

/// Row-wise max of an overlap matrix. Ties go to the lowest column.
pub fn argmax_rows(overlaps: &Array2<f32>) -> Result<Assignment> {
    if overlaps.ncols() == 0 {
        return Err(TargetError::NoGroundTruth);
    }

    let n = overlaps.nrows();
    let mut max_overlaps = Array1::<f32>::zeros(n);
    let mut gt_assignment = Array1::<usize>::zeros(n);

    for (i, row) in overlaps.outer_iter().enumerate() {
        let mut best = 0;
        let mut best_overlap = row[0];
        for (j, &value) in row.iter().enumerate().skip(1) {
            if value > best_overlap {
                best = j;
                best_overlap = value;
            }
        }
        max_overlaps[i] = best_overlap;
        gt_assignment[i] = best;
    }

    Ok(Assignment {
        max_overlaps,
        gt_assignment,
    })
}

/// Overlap matrix `[candidates × ground_truth]` and its best-match reduction.
pub fn build_assignment(
    candidates: &[Proposal],
    ground_truth: &[GroundTruthBox],
) -> Result<(Array2<f32>, Assignment)> {
    if ground_truth.is_empty() {
        return Err(TargetError::NoGroundTruth);
    }

    let boxes: Vec<BoundingBox> = candidates.iter().map(|p| p.bbox).collect();
    let gt_boxes: Vec<BoundingBox> = ground_truth.iter().map(|gt| gt.bbox).collect();

    let overlaps = bbox_overlaps(&boxes, &gt_boxes);
    let assignment = argmax_rows(&overlaps)?;
    Ok((overlaps, assignment))
}
