//! Domain types for DepthLab

pub mod answer;
pub mod trajectory;

pub use answer::{
    answers_match, extract_last_number, normalize_answer,
    normalize_answer_value,
};
pub use trajectory::{Checkpoint, Trajectory, TrajectoryError};
