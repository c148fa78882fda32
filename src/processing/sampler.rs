use ndarray::{Array1, Axis};
use ndarray_rand::rand::Rng;
use ndarray_rand::{RandomExt, SamplingStrategy};

use crate::error::{Result, TargetError};
use crate::processing::overlaps::Assignment;
use crate::rcnn::config::TrainConfig;

/// Candidate indices split by max overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct Strata {
    pub foreground: Array1<usize>,
    pub background: Array1<usize>,
}

impl Strata {
    pub fn classify(assignment: &Assignment, config: &TrainConfig) -> Self {
        let mut foreground = Vec::new();
        let mut background = Vec::new();
        for (i, &max_overlap) in assignment.max_overlaps.iter().enumerate() {
            if max_overlap >= config.fg_thresh {
                foreground.push(i);
            }
            // with bg_thresh_hi above fg_thresh a roi can sit in both strata
            if max_overlap < config.bg_thresh_hi && max_overlap >= config.bg_thresh_lo {
                background.push(i);
            }
        }
        Strata {
            foreground: Array1::from(foreground),
            background: Array1::from(background),
        }
    }
}

/// Indices picked for one image: `fg_count` foreground entries, then background.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledRois {
    pub keep_inds: Vec<usize>,
    pub fg_count: usize,
}

impl SampledRois {
    pub fn bg_count(&self) -> usize {
        self.keep_inds.len() - self.fg_count
    }
}

/// Draws exactly `rois_per_image` candidate indices.
///
/// With both strata populated, up to `fg_rois_per_image` foreground RoIs are
/// taken without replacement and the rest is filled from background with
/// replacement. A single populated stratum fills every slot with replacement.
pub fn sample_rois<R: Rng + ?Sized>(
    assignment: &Assignment,
    rng: &mut R,
    rois_per_image: usize,
    fg_rois_per_image: usize,
    config: &TrainConfig,
) -> Result<SampledRois> {
    if rois_per_image == 0 {
        return Err(TargetError::InvalidConfig(
            "rois_per_image must be at least 1".to_string(),
        ));
    }

    let strata = Strata::classify(assignment, config);
    let fg_num_rois = strata.foreground.len();
    let bg_num_rois = strata.background.len();
    log::debug!("strata: {fg_num_rois} foreground, {bg_num_rois} background");

    let (fg_inds, bg_inds) = match (fg_num_rois > 0, bg_num_rois > 0) {
        (true, true) => {
            let fg_rois_per_this_image = fg_rois_per_image.min(fg_num_rois).min(rois_per_image);
            let fg_inds = strata.foreground.sample_axis_using(
                Axis(0),
                fg_rois_per_this_image,
                SamplingStrategy::WithoutReplacement,
                rng,
            );
            let bg_inds = strata.background.sample_axis_using(
                Axis(0),
                rois_per_image - fg_rois_per_this_image,
                SamplingStrategy::WithReplacement,
                rng,
            );
            (fg_inds, bg_inds)
        }
        (true, false) => {
            log::warn!("no background rois, sampling {rois_per_image} from foreground");
            let fg_inds = strata.foreground.sample_axis_using(
                Axis(0),
                rois_per_image,
                SamplingStrategy::WithReplacement,
                rng,
            );
            (fg_inds, Array1::zeros(0))
        }
        (false, true) => {
            log::warn!("no foreground rois, sampling {rois_per_image} from background");
            let bg_inds = strata.background.sample_axis_using(
                Axis(0),
                rois_per_image,
                SamplingStrategy::WithReplacement,
                rng,
            );
            (Array1::zeros(0), bg_inds)
        }
        (false, false) => {
            return Err(TargetError::EmptyStrata {
                fg_thresh: config.fg_thresh,
                bg_thresh_lo: config.bg_thresh_lo,
                bg_thresh_hi: config.bg_thresh_hi,
            })
        }
    };

    let fg_count = fg_inds.len();
    let mut keep_inds = fg_inds.to_vec();
    keep_inds.extend(bg_inds.iter().copied());

    log::debug!(
        "sampled {} rois ({} foreground)",
        keep_inds.len(),
        fg_count
    );

    Ok(SampledRois {
        keep_inds,
        fg_count,
    })
}
