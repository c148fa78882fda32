use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TargetError {
    #[error("invalid box [{x1}, {y1}, {x2}, {y2}]: {reason}")]
    InvalidBox {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        reason: &'static str,
    },
    #[error("image has no ground-truth boxes, assignment is undefined")]
    NoGroundTruth,
    #[error(
        "no foreground (>= {fg_thresh}) and no background ([{bg_thresh_lo}, {bg_thresh_hi})) rois"
    )]
    EmptyStrata {
        fg_thresh: f32,
        bg_thresh_lo: f32,
        bg_thresh_hi: f32,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("class label {label} out of range for {num_classes} classes")]
    ClassOutOfRange { label: usize, num_classes: usize },
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

pub type Result<T> = std::result::Result<T, TargetError>;
