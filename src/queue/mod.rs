//! Concurrent multi-queue (§4.A).

mod multiqueue;

pub use multiqueue::MultiQueue;
