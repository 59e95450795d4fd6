//! Crypto, cache, upstream pool, tenant resolution, rate limiting, and
//! upstream dispatch: the stateful core of the gateway's data plane.

pub mod body;
pub mod cache;
pub mod crypto;
pub mod rate_limiter;
pub mod resolver;
pub mod upstream_client;
pub mod upstream_pool;

// vim: ts=4
