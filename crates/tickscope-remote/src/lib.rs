//! tickscope remote — TickTick web API client and plan executor.

pub mod client;
pub mod error;
pub mod executor;

pub use client::{LiveSnapshot, TickTickClient};
pub use error::{RemoteError, Result};
pub use executor::{AppliedStats, TaskStore, apply_capture_plan, apply_dedupe};
