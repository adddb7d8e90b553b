// crates/server/src/jobs/mod.rs
//! Job execution: the chunk worker pool and its cancellation plumbing.
//!
//! The entities themselves live in `rowforge_core`; this module is the
//! runtime that drives them.

mod runner;

pub use runner::JobRunner;
