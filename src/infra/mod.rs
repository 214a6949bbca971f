//! Infrastructure adapters for stage queue backends.

pub mod queue;

pub use queue::InMemoryQueue;
