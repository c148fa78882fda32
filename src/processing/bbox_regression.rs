use ndarray::{s, Array1, Array2, ArrayView1};

use crate::error::{Result, TargetError};
use crate::rcnn::bbox::{encode_delta, BoundingBox};
use crate::rcnn::config::TrainConfig;

/// `(delta - means) / stds`, component-wise.
pub fn normalize(delta: [f32; 4], config: &TrainConfig) -> [f32; 4] {
    let mut out = delta;
    for (i, v) in out.iter_mut().enumerate() {
        *v = (*v - config.bbox_normalize_means[i]) / config.bbox_normalize_stds[i];
    }
    out
}

/// Inverse of [`normalize`], for turning predicted deltas back into pixel space.
pub fn denormalize(delta: [f32; 4], config: &TrainConfig) -> [f32; 4] {
    let mut out = delta;
    for (i, v) in out.iter_mut().enumerate() {
        *v = *v * config.bbox_normalize_stds[i] + config.bbox_normalize_means[i];
    }
    out
}

/// Regression targets and inside weights for sampled RoIs.
///
/// * `rois` - sampled RoI boxes, N.
/// * `gt_rois` - matched ground-truth box of every RoI, N.
/// * `labels` - class of every RoI after background clamping, N.
/// * `return` - `([N × 4] targets, [N × 4] inside weights)`; rows with label 0 stay zero.
pub fn compute_targets(
    rois: &[BoundingBox],
    gt_rois: &[BoundingBox],
    labels: &Array1<usize>,
    config: &TrainConfig,
) -> Result<(Array2<f32>, Array2<f32>)> {
    if gt_rois.len() != rois.len() {
        return Err(TargetError::ShapeMismatch {
            expected: rois.len(),
            actual: gt_rois.len(),
        });
    }
    if labels.len() != rois.len() {
        return Err(TargetError::ShapeMismatch {
            expected: rois.len(),
            actual: labels.len(),
        });
    }

    let n = rois.len();
    let mut bbox_targets = Array2::<f32>::zeros((n, 4));
    let mut bbox_inside_weights = Array2::<f32>::zeros((n, 4));

    for (index, &cls) in labels.iter().enumerate() {
        if cls == 0 {
            continue;
        }
        let mut delta = encode_delta(&rois[index], &gt_rois[index])?;
        if config.bbox_normalize_targets_precomputed {
            delta = normalize(delta, config);
        }
        bbox_targets
            .row_mut(index)
            .assign(&ArrayView1::from(&delta[..]));
        bbox_inside_weights
            .row_mut(index)
            .assign(&ArrayView1::from(&config.bbox_inside_weights[..]));
    }

    Ok((bbox_targets, bbox_inside_weights))
}

/// 1 wherever the inside weight is positive.
pub fn outside_weights(bbox_inside_weights: &Array2<f32>) -> Array2<f32> {
    bbox_inside_weights.mapv(|w| if w > 0.0 { 1.0 } else { 0.0 })
}

/// Expands `[N × 4]` targets into the `[N × 4K]` layout where only the
/// columns of the RoI's own class are non-zero.
pub fn expand_bbox_regression_targets(
    bbox_targets_data: &Array2<f32>,
    labels: &Array1<usize>,
    num_classes: usize,
    bbox_inside_weights: &Array2<f32>,
) -> Result<(Array2<f32>, Array2<f32>)> {
    let k = labels.len();
    let mut bbox_targets = Array2::<f32>::zeros((k, 4 * num_classes));
    let mut bbox_weights = Array2::<f32>::zeros((k, 4 * num_classes));

    for (index, &cls) in labels.iter().enumerate() {
        if cls == 0 {
            continue;
        }
        if cls >= num_classes {
            return Err(TargetError::ClassOutOfRange {
                label: cls,
                num_classes,
            });
        }
        let start = 4 * cls;
        let end = start + 4;
        bbox_targets
            .slice_mut(s![index, start..end])
            .assign(&bbox_targets_data.row(index));
        bbox_weights
            .slice_mut(s![index, start..end])
            .assign(&bbox_inside_weights.row(index));
    }

    Ok((bbox_targets, bbox_weights))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;
    use crate::rcnn::bbox::decode_delta;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2)
    }

    #[test]
    fn test_background_rows_are_zero() {
        let config = TrainConfig::new();
        let rois = [bbox(0.0, 0.0, 10.0, 10.0), bbox(5.0, 5.0, 25.0, 30.0)];
        let gt_rois = [bbox(1.0, 1.0, 11.0, 12.0), bbox(0.0, 0.0, 20.0, 20.0)];
        let labels = array![2, 0];

        let (targets, inside) = compute_targets(&rois, &gt_rois, &labels, &config).unwrap();

        assert_eq!(targets.row(1), array![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(inside.row(1), array![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(inside.row(0), array![1.0, 1.0, 1.0, 1.0]);
        assert!(targets.row(0).iter().any(|&t| t != 0.0));
    }

    #[test]
    fn test_inside_weights_copied_per_coordinate() {
        let config = TrainConfig {
            bbox_inside_weights: [1.0, 0.5, 2.0, 0.25],
            bbox_normalize_targets_precomputed: false,
            ..TrainConfig::new()
        };
        // dx = 1, dy = 0, dw = ln 2, dh = 0
        let rois = [bbox(0.0, 0.0, 10.0, 20.0), bbox(0.0, 0.0, 10.0, 10.0)];
        let gt_rois = [bbox(5.0, 0.0, 25.0, 20.0), bbox(0.0, 0.0, 10.0, 10.0)];

        let (targets, inside) = compute_targets(&rois, &gt_rois, &array![1, 0], &config).unwrap();

        assert_eq!(inside.row(0), array![1.0, 0.5, 2.0, 0.25]);
        assert_eq!(inside.row(1), array![0.0, 0.0, 0.0, 0.0]);
        assert_relative_eq!(targets[(0, 0)], 1.0);
        assert_relative_eq!(targets[(0, 2)], 2.0_f32.ln());
    }

    #[test]
    fn test_background_rows_skip_degenerate_boxes() {
        let config = TrainConfig::new();
        let rois = [bbox(5.0, 5.0, 5.0, 5.0)];
        let gt_rois = [bbox(0.0, 0.0, 20.0, 20.0)];

        let (targets, _) = compute_targets(&rois, &gt_rois, &array![0], &config).unwrap();
        assert_eq!(targets.row(0), array![0.0, 0.0, 0.0, 0.0]);

        assert!(compute_targets(&rois, &gt_rois, &array![1], &config).is_err());
    }

    #[test]
    fn test_normalization_applied() {
        let config = TrainConfig {
            bbox_normalize_means: [0.1, 0.0, 0.0, 0.0],
            ..TrainConfig::new()
        };
        // dx = 1, dy = 0, dw = ln 2, dh = 0
        let rois = [bbox(0.0, 0.0, 10.0, 20.0)];
        let gt_rois = [bbox(5.0, 0.0, 25.0, 20.0)];

        let (targets, _) = compute_targets(&rois, &gt_rois, &array![1], &config).unwrap();

        assert_relative_eq!(targets[(0, 0)], (1.0 - 0.1) / 0.1, epsilon = 1e-4);
        assert_relative_eq!(targets[(0, 1)], 0.0);
        assert_relative_eq!(targets[(0, 2)], 2.0_f32.ln() / 0.2, epsilon = 1e-5);
        assert_relative_eq!(targets[(0, 3)], 0.0);
    }

    #[test]
    fn test_normalization_disabled_round_trips() {
        let config = TrainConfig {
            bbox_normalize_targets_precomputed: false,
            ..TrainConfig::new()
        };
        let roi = bbox(12.0, 8.0, 40.0, 52.0);
        let gt_roi = bbox(10.0, 10.0, 44.0, 50.0);

        let (targets, _) = compute_targets(&[roi], &[gt_roi], &array![3], &config).unwrap();
        let delta = [targets[(0, 0)], targets[(0, 1)], targets[(0, 2)], targets[(0, 3)]];
        let decoded = decode_delta(&roi, &delta).unwrap();

        assert_relative_eq!(decoded.x1, gt_roi.x1, epsilon = 1e-3);
        assert_relative_eq!(decoded.y2, gt_roi.y2, epsilon = 1e-3);
    }

    #[test]
    fn test_denormalize_inverts_normalize() {
        let config = TrainConfig {
            bbox_normalize_means: [0.5, -0.25, 0.1, 0.0],
            ..TrainConfig::new()
        };
        let delta = [0.3, -0.2, 0.05, 1.5];
        let back = denormalize(normalize(delta, &config), &config);
        for (a, b) in back.iter().zip(delta.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_outside_weights() {
        let inside = array![[1.0, 1.0, 1.0, 1.0], [0.0, 0.0, 0.0, 0.0], [0.5, 0.0, 2.0, 0.0]];
        assert_eq!(
            outside_weights(&inside),
            array![[1.0, 1.0, 1.0, 1.0], [0.0, 0.0, 0.0, 0.0], [1.0, 0.0, 1.0, 0.0]]
        );
    }

    #[test]
    fn test_expand_bbox_regression_targets() {
        let bbox_targets_data = array![
            [0.1, 0.2, 0.3, 0.4],
            [0.2, 0.3, 0.4, 0.5],
            [0.0, 0.0, 0.0, 0.0],
            [0.3, 0.4, 0.5, 0.6]
        ];
        let inside = array![
            [1.0, 1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0, 1.0],
            [0.0, 0.0, 0.0, 0.0],
            [1.0, 1.0, 1.0, 1.0]
        ];
        let labels = array![1, 2, 0, 1];

        let (targets, weights) =
            expand_bbox_regression_targets(&bbox_targets_data, &labels, 3, &inside).unwrap();

        assert_eq!(targets.dim(), (4, 12));
        assert_eq!(targets.slice(s![0, 4..8]), array![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(targets.slice(s![1, 8..12]), array![0.2, 0.3, 0.4, 0.5]);
        assert!(targets.row(2).iter().all(|&v| v == 0.0));
        assert_eq!(weights.row(0).sum(), 4.0);
        assert_eq!(weights.slice(s![3, 4..8]), array![1.0, 1.0, 1.0, 1.0]);
        assert_eq!(weights.slice(s![3, 0..4]), array![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_expand_rejects_unknown_class() {
        let data = Array2::<f32>::zeros((1, 4));
        let result = expand_bbox_regression_targets(&data, &array![5], 3, &data);
        assert_eq!(
            result,
            Err(TargetError::ClassOutOfRange {
                label: 5,
                num_classes: 3
            })
        );
    }

    #[test]
    fn test_compute_targets_shape_mismatch() {
        let rois = [bbox(0.0, 0.0, 10.0, 10.0)];
        let result = compute_targets(&rois, &[], &array![1], &TrainConfig::new());
        assert!(matches!(result, Err(TargetError::ShapeMismatch { .. })));
    }
}
