use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// Training-time options of the proposal target layer.
///
/// Built once and shared read-only by every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// RoIs with max overlap at or above this are foreground.
    pub fg_thresh: f32,
    /// Background is `[bg_thresh_lo, bg_thresh_hi)`.
    pub bg_thresh_hi: f32,
    pub bg_thresh_lo: f32,
    /// RoIs per minibatch, split evenly across images.
    pub batch_size: usize,
    pub fg_fraction: f32,
    pub bbox_normalize_targets_precomputed: bool,
    pub bbox_normalize_means: [f32; 4],
    pub bbox_normalize_stds: [f32; 4],
    pub bbox_inside_weights: [f32; 4],
}

impl TrainConfig {
    pub fn new() -> Self {
        TrainConfig {
            fg_thresh: 0.5,
            bg_thresh_hi: 0.5,
            bg_thresh_lo: 0.0,
            batch_size: 128,
            fg_fraction: 0.25,
            bbox_normalize_targets_precomputed: true,
            bbox_normalize_means: [0.0, 0.0, 0.0, 0.0],
            bbox_normalize_stds: [0.1, 0.1, 0.2, 0.2],
            bbox_inside_weights: [1.0, 1.0, 1.0, 1.0],
        }
    }

    /// Parses a JSON object; missing keys keep their default value.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: TrainConfig = serde_json::from_str(json)
            .map_err(|e| TargetError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("fg_thresh", self.fg_thresh),
            ("bg_thresh_hi", self.bg_thresh_hi),
            ("bg_thresh_lo", self.bg_thresh_lo),
            ("fg_fraction", self.fg_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TargetError::InvalidConfig(format!(
                    "{name} must be in [0, 1], got {value}"
                )));
            }
        }
        if self.fg_thresh <= 0.0 {
            return Err(TargetError::InvalidConfig(
                "fg_thresh must be positive".to_string(),
            ));
        }
        if self.bg_thresh_lo > self.bg_thresh_hi {
            return Err(TargetError::InvalidConfig(format!(
                "bg_thresh_lo ({}) is above bg_thresh_hi ({})",
                self.bg_thresh_lo, self.bg_thresh_hi
            )));
        }
        if self.batch_size == 0 {
            return Err(TargetError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self
            .bbox_normalize_stds
            .iter()
            .any(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(TargetError::InvalidConfig(format!(
                "bbox_normalize_stds must be finite and non-zero, got {:?}",
                self.bbox_normalize_stds
            )));
        }
        if self
            .bbox_normalize_means
            .iter()
            .chain(self.bbox_inside_weights.iter())
            .any(|v| !v.is_finite())
        {
            return Err(TargetError::InvalidConfig(
                "bbox means and inside weights must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Foreground quota per image: `round(fg_fraction * rois_per_image)`,
    /// half to even, never below 1.
    pub fn fg_rois_per_image(&self, rois_per_image: usize) -> usize {
        let fg = (self.fg_fraction * rois_per_image as f32).round_ties_even() as usize;
        fg.max(1)
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig::new()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TrainConfig::new().validate().is_ok());
    }

    #[rstest]
    #[case(128, 0.25, 32)]
    #[case(8, 0.25, 2)]
    #[case(10, 0.25, 2)]
    #[case(14, 0.25, 4)]
    #[case(4, 0.0, 1)]
    #[case(1, 0.25, 1)]
    fn test_fg_rois_per_image(
        #[case] rois_per_image: usize,
        #[case] fg_fraction: f32,
        #[case] expected: usize,
    ) {
        let config = TrainConfig {
            fg_fraction,
            ..TrainConfig::new()
        };
        assert_eq!(config.fg_rois_per_image(rois_per_image), expected);
    }

    #[test]
    fn test_from_json_partial() {
        let config = TrainConfig::from_json(r#"{"batch_size": 64, "fg_thresh": 0.7}"#).unwrap();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.fg_thresh, 0.7);
        assert_eq!(config.bbox_normalize_stds, [0.1, 0.1, 0.2, 0.2]);
    }

    #[rstest]
    #[case::fg_thresh_above_one(r#"{"fg_thresh": 1.5}"#)]
    #[case::zero_fg_thresh(r#"{"fg_thresh": 0.0}"#)]
    #[case::inverted_bg(r#"{"bg_thresh_lo": 0.4, "bg_thresh_hi": 0.1}"#)]
    #[case::zero_batch(r#"{"batch_size": 0}"#)]
    #[case::zero_std(r#"{"bbox_normalize_stds": [0.1, 0.0, 0.2, 0.2]}"#)]
    #[case::not_json("batch_size = 4")]
    fn test_from_json_rejects(#[case] json: &str) {
        assert!(matches!(
            TrainConfig::from_json(json),
            Err(TargetError::InvalidConfig(_))
        ));
    }
}
