//! Processing log and derived state
//!
//! - [`state`] - State derived from the latest log entry
//! - [`manager`] - Log access, state queries, and administrative reset

pub mod manager;
pub mod state;

pub use manager::ProcessingLogManager;
pub use state::{ProcessingState, RetryStreak};
