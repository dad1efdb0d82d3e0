//! State module for tracking fetch session progress
//!
//! # Components
//!
//! - `SessionPhase`: where in the fetch-control loop a session currently is
//! - `SessionState`: cursor, counters and backoff owned by one session

mod session_phase;
mod session_state;

// Re-export main types
pub use session_phase::SessionPhase;
pub use session_state::{SessionState, FIRST_CURSOR};
