//! Per-shard entry storage.

pub mod bucket;

pub use bucket::Bucket;
