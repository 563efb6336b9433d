//! DepthLab Core — data model, ingestion and stopping policies for anytime
//! reasoning trajectories.
//!
//! - Domain types (checkpoints, trajectories) and answer normalization
//! - JSONL ingestion for both per-trajectory and flat per-step layouts
//! - Stopping policies (fixed, confidence, stability, random, argmax, oracle)
//! - Deterministic RNG streams for every stochastic step

pub mod domain;
pub mod ingest;
pub mod policy;
pub mod rng;

pub use domain::{Checkpoint, Trajectory, TrajectoryError};
pub use ingest::{IngestError, RecordError};
pub use policy::{EvalParams, PolicyError, PolicyKind, StopHistogram, StopRule};
pub use rng::RngStreams;
