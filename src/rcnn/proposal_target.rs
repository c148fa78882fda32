use ndarray::{Array1, Array2};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::{Rng, SeedableRng};

use crate::error::{Result, TargetError};
use crate::processing::bbox_regression::{compute_targets, outside_weights};
use crate::processing::overlaps::{append_ground_truth, build_assignment, strip_padding};
use crate::processing::sampler::sample_rois;
use crate::rcnn::bbox::BoundingBox;
use crate::rcnn::config::TrainConfig;
use crate::rcnn::roi::{GroundTruthBox, Proposal, TrainingBatch};

/// Proposals and annotations of one image.
#[derive(Debug, Clone, Default)]
pub struct ImageInput {
    pub proposals: Vec<Proposal>,
    pub ground_truth: Vec<GroundTruthBox>,
}

/// Assigns object detection proposals to ground-truth targets and samples
/// the RoIs the second stage is trained on, with their classification
/// labels, pose labels and bounding-box regression targets.
#[derive(Debug, Clone)]
pub struct ProposalTargetLayer {
    config: TrainConfig,
    num_classes: usize,
}

impl ProposalTargetLayer {
    pub fn new(config: TrainConfig, num_classes: usize) -> Result<Self> {
        config.validate()?;
        if num_classes < 2 {
            return Err(TargetError::InvalidConfig(format!(
                "num_classes must include background and at least one object class, got {num_classes}"
            )));
        }
        Ok(ProposalTargetLayer {
            config,
            num_classes,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Samples `batch_size` RoIs for a single image.
    pub fn assign<R: Rng + ?Sized>(
        &self,
        proposals: &[Proposal],
        ground_truth: &[GroundTruthBox],
        batch_index: usize,
        rng: &mut R,
    ) -> Result<TrainingBatch> {
        self.sample_image(
            proposals,
            ground_truth,
            batch_index,
            self.config.batch_size,
            rng,
        )
    }

    /// [`Self::assign`] with a fresh RNG seeded from `seed`.
    pub fn assign_seeded(
        &self,
        proposals: &[Proposal],
        ground_truth: &[GroundTruthBox],
        batch_index: usize,
        seed: u64,
    ) -> Result<TrainingBatch> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.assign(proposals, ground_truth, batch_index, &mut rng)
    }

    /// Samples every image independently, `batch_size / images.len()` RoIs
    /// each, and concatenates the results in image order.
    pub fn assign_batch<R: Rng + ?Sized>(
        &self,
        images: &[ImageInput],
        rng: &mut R,
    ) -> Result<TrainingBatch> {
        if images.is_empty() {
            return Ok(TrainingBatch::empty());
        }
        let rois_per_image = self.config.batch_size / images.len();
        if rois_per_image == 0 {
            return Err(TargetError::InvalidConfig(format!(
                "batch_size {} is smaller than the number of images {}",
                self.config.batch_size,
                images.len()
            )));
        }

        let batches = images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                self.sample_image(
                    &image.proposals,
                    &image.ground_truth,
                    i,
                    rois_per_image,
                    rng,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        TrainingBatch::concat(&batches)
    }

    fn sample_image<R: Rng + ?Sized>(
        &self,
        proposals: &[Proposal],
        ground_truth: &[GroundTruthBox],
        batch_index: usize,
        rois_per_image: usize,
        rng: &mut R,
    ) -> Result<TrainingBatch> {
        let ground_truth = strip_padding(ground_truth);
        if ground_truth.is_empty() {
            return Err(TargetError::NoGroundTruth);
        }
        for proposal in proposals {
            proposal.bbox.validate()?;
        }
        for gt in &ground_truth {
            gt.bbox.validate()?;
            if gt.class == 0 || gt.class >= self.num_classes {
                return Err(TargetError::ClassOutOfRange {
                    label: gt.class,
                    num_classes: self.num_classes,
                });
            }
        }

        let all_rois = append_ground_truth(proposals, &ground_truth, batch_index);
        let (_, assignment) = build_assignment(&all_rois, &ground_truth)?;

        let fg_rois_per_image = self.config.fg_rois_per_image(rois_per_image);
        let sampled = sample_rois(
            &assignment,
            rng,
            rois_per_image,
            fg_rois_per_image,
            &self.config,
        )?;

        let n = sampled.keep_inds.len();
        let mut rois = Array2::<f32>::zeros((n, 5));
        let mut labels = Array1::<usize>::zeros(n);
        let mut poses = Array1::<i64>::zeros(n);
        let mut roi_boxes: Vec<BoundingBox> = Vec::with_capacity(n);
        let mut gt_rois: Vec<BoundingBox> = Vec::with_capacity(n);

        for (slot, &keep) in sampled.keep_inds.iter().enumerate() {
            let roi = &all_rois[keep];
            let gt = &ground_truth[assignment.gt_assignment[keep]];

            // background rois never carry a class or pose
            if slot < sampled.fg_count {
                labels[slot] = gt.class;
                poses[slot] = gt.pose;
            }

            rois[(slot, 0)] = batch_index as f32;
            rois[(slot, 1)] = roi.bbox.x1;
            rois[(slot, 2)] = roi.bbox.y1;
            rois[(slot, 3)] = roi.bbox.x2;
            rois[(slot, 4)] = roi.bbox.y2;

            roi_boxes.push(roi.bbox);
            gt_rois.push(gt.bbox);
        }

        let (bbox_targets, bbox_inside_weights) =
            compute_targets(&roi_boxes, &gt_rois, &labels, &self.config)?;
        let bbox_outside_weights = outside_weights(&bbox_inside_weights);

        log::debug!(
            "image {batch_index}: {} rois, {} foreground",
            n,
            sampled.fg_count
        );

        Ok(TrainingBatch {
            rois,
            labels,
            poses,
            bbox_targets,
            bbox_inside_weights,
            bbox_outside_weights,
        })
    }
}
