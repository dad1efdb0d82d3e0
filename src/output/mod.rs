//! Output module
//!
//! This module handles:
//! - Appending accepted result URLs to their destination
//! - Serializing appends from concurrent sessions
//! - Summarizing a run once it is over

mod sink;
pub mod stats;

pub use sink::{FileSink, MemorySink, OutputError, OutputResult, SharedSink, Sink};
pub use stats::{print_summary, QueryFailure, RunSummary};
