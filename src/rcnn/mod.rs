pub mod bbox;
pub mod config;
pub mod proposal_target;
pub mod roi;
