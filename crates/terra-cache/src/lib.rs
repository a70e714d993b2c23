//! Keyed fetch-with-cache primitive shared by every Terra feature area.
//!
//! [`KeyedAsyncCache`] resolves a [`FetchKey`](terra_core::FetchKey) from its
//! in-memory entries, from a value transferred by a server-side render, or by
//! running the caller's producer exactly once per key.

pub mod cache;
pub mod transfer;

pub use cache::{CacheConfig, KeyedAsyncCache, ResolveOptions, Result, DEFAULT_TTL};
pub use transfer::{ClientEnvironment, ServerEnvironment, TransferPayload};
