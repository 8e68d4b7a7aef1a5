//! State management for release promotion.
//!
//! The release document is the only durable record of progress. Every completed step is
//! written back immediately so an interrupted run resumes where it stopped.

mod manager;
mod release_state;

pub use manager::StateManager;
pub use release_state::{
    Branch, BuildDescriptor, DEFAULT_BRANCH_PREFIX, Environment, Release, STATE_FORMAT_VERSION, Stage,
    is_valid_release_id, next_monday,
};
