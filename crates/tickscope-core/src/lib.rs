//! tickscope core — task model, duplicate detection, capture planning, digest.
//!
//! Everything in this crate is synchronous and free of network I/O.

pub mod capture;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod digest;
pub mod error;
pub mod model;
pub mod normalize;
pub mod rules;
pub mod similarity;
pub mod snapshot;

pub use capture::{CaptureOptions, MergePlan, build_capture_plan};
pub use config::AppConfig;
pub use dedup::{DedupScope, DedupeOptions, DuplicateGroup, detect_duplicates};
pub use digest::{Digest, build_digest};
pub use error::{CoreError, ExitCode, Result};
pub use model::{CanonicalTask, TaskRef, TaskStatus};
pub use normalize::NormalizeContext;
pub use rules::{CaptureRules, TaskClass};
pub use snapshot::{CacheSnapshot, Credentials, SyncSnapshot};
