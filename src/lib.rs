//! ttlkit: a sharded in-memory key/value cache with per-entry TTL,
//! background eviction and crash-recoverable dumps.
//!
//! ## Components
//!
//! | Module      | Role                                                        |
//! |-------------|-------------------------------------------------------------|
//! | [`cache`]   | [`Cache`] orchestrator: routing, lifecycle, bulk operations |
//! | [`store`]   | [`Bucket`](store::Bucket): one lock-guarded shard           |
//! | [`clock`]   | time source and periodic scheduler, plus a test clock       |
//! | [`dump`]    | dump framing, file writer/reader                            |
//! | [`endec`]   | payload encoders/decoders                                   |
//! | [`metrics`] | per-bucket metrics sinks and exporters                      |
//! | [`config`]  | [`Config`] and defaults; [`builder`] for fluent setup       |
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use ttlkit::prelude::*;
//!
//! let cache = CacheBuilder::<String>::new(4)
//!     .hasher(FxKeyHasher)
//!     .ttl(Duration::from_secs(300))
//!     .build()
//!     .unwrap();
//!
//! cache.set("session:9", "token".to_string()).unwrap();
//! match cache.get("session:9") {
//!     Ok(token) => assert_eq!(token, "token"),
//!     Err(err) if err.is_lookup_miss() => unreachable!(),
//!     Err(err) => panic!("{err}"),
//! }
//! ```

pub mod builder;
pub mod cache;
pub mod clock;
pub mod config;
pub mod ds;
pub mod dump;
pub mod endec;
pub mod error;
pub mod hasher;
pub mod logger;
pub mod metrics;
pub mod prelude;
pub mod store;

pub use builder::CacheBuilder;
pub use cache::{Cache, CacheStatus};
pub use config::Config;
pub use error::{CacheError, ConfigError};
pub use hasher::{FxKeyHasher, KeyHasher, SipKeyHasher};
