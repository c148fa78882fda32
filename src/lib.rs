pub mod error;
pub mod processing;
pub mod rcnn;

pub use error::{Result, TargetError};
pub use rcnn::bbox::BoundingBox;
pub use rcnn::config::TrainConfig;
pub use rcnn::proposal_target::{ImageInput, ProposalTargetLayer};
pub use rcnn::roi::{GroundTruthBox, Proposal, TrainingBatch};
