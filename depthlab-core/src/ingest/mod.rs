//! JSONL ingestion: parsing, field alias resolution and normalization into
//! [`Trajectory`](crate::domain::Trajectory) values.

pub mod aliases;
pub mod error;
pub mod jsonl;
pub mod normalize;

pub use aliases::FieldAliases;
pub use error::{IngestError, RecordError};
pub use jsonl::{parse_jsonl, parse_jsonl_str, read_jsonl, JsonlBatch, RawRecord};
pub use normalize::{
    detect_format, load_trajectories, normalize, normalize_records, InputFormat, Normalized,
    DEFAULT_CONFIDENCE, DETECT_WINDOW,
};
