//! Stateright Model Checking for regopts
//!
//! Exhaustive state-space exploration of the write queue's ordering
//! guarantees.
//!
//! ## Available Models
//!
//! - `write_ordering`: queued writes versus deletes of the same value
//!
//! ## Running Model Checks
//!
//! ```bash
//! # Bounded checks run with the normal test suite; the exhaustive run is ignored
//! cargo test stateright -- --ignored --nocapture
//! ```

pub mod write_ordering;

#[cfg(test)]
pub use write_ordering::WriteOrderingModel;
