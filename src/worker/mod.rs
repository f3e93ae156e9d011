//! Fixed worker pool
//!
//! Each worker owns one broker channel and runs its jobs sequentially. When the
//! broker is dropped the channels close and every worker finishes its backlog
//! before exiting.

pub mod runner;

pub use runner::{run_worker, spawn_workers};
