//! matrix-batch core
//!
//! Batches origin/destination pairs into a remote distance-matrix service,
//! one size-bounded request at a time, and snapshots results after every chunk.

pub mod batch;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod events;
pub mod grouping;
pub mod matrix;
pub mod ors;
pub mod pipeline;
pub mod retry;
pub mod sink;
pub mod table;
pub mod traits;

pub use error::Error;
