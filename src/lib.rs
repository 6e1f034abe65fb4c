#![deny(missing_docs)]

//! The kvbench crate measures the throughput of a networked key-value store
//! under four concurrency disciplines: serial blocking calls, independent
//! blocking worker threads, a bounded window of asynchronously pipelined
//! operations, and strictly sequential fixed-size batches.

#[macro_use]
extern crate failure;

#[macro_use]
extern crate slog;

pub use bench::*;
pub use client::*;
pub use error::*;
pub use net::*;
pub use strategy::*;
pub use warmup::*;
pub use workload::*;

mod bench;
mod client;
mod error;
mod net;
pub mod protocol;
mod strategy;
mod warmup;
mod workload;
