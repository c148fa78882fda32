pub mod bbox_regression;
pub mod overlaps;
pub mod sampler;
