//! Scope-bound memoization.
//!
//! `ComputationalCache` keeps expensive values (and hot streams) alive for as
//! long as at least one caller-owned `ComputationScope` depends on them, and
//! collapses concurrent misses for the same key into a single computation.

pub mod computational;
pub mod error;
pub mod scope;
pub mod shared;

pub use computational::ComputationalCache;
pub use error::CacheError;
pub use scope::{ComputationScope, ScopeId};
pub use shared::{SharedStream, Subscription};
