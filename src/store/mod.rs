//! Embedded store module.
//!
//! Provides a cache-style API over a single redb file:
//! - Scalars (get/set/del)
//! - Hashes of fields (hset/hget/hvals/hdel)
//! - Ordered lists (rpush/lrange/lset/ltrim/lrem)

pub mod db;
pub mod range;

pub use db::Store;
