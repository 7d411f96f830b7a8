//! Cost- and freshness-aware cache admission and refresh policies for a
//! content-delivery cache over a fixed library of items.
//!
//! # Features
//! - **Popularity Estimation**: exact, sliding-window, lazy ("lite") and
//!   count-sketch estimators behind one [`PopularityEstimator`] contract.
//! - **Refresh Optimization**: joint choice of cache membership and refresh
//!   rate, shared across the cache ([`SharedRateOptimizer`]) or per item
//!   ([`PerItemOptimizer`]).
//! - **Freshness Budgets**: single-tier ([`FreshnessCache`]) and two-tier
//!   ([`TandemFreshnessCache`]) caches that evict by remaining value.
//! - **Reproducibility**: every stochastic component draws from an explicit
//!   seeded [`SimRng`].
//! - **Sweeps**: optional `bulk` feature runs independent simulations in
//!   parallel with `rayon`.
//!
//! All policies are single-owner and synchronous; they emit `tracing` events
//! but never install a subscriber.

// Public modules that form the API
pub mod builder;
pub mod config;
pub mod cost;
pub mod error;
pub mod freshness;
pub mod library;
pub mod metrics;
pub mod optimizer;
pub mod policy;
pub mod popularity;
pub mod rng;

#[cfg(feature = "bulk")]
pub mod sweep;

/// Index of an item in the library, `0..L`.
pub type ItemId = usize;

// Re-export the primary user-facing types for convenience
pub use builder::PolicyBuilder;
pub use config::PolicyConfig;
pub use cost::CostModel;
pub use error::{BuildError, Error, RequestError, Result};
pub use freshness::{EstimatorKind, FreshnessCache, PopularityModel, TandemFreshnessCache};
pub use library::Library;
pub use metrics::MetricsSnapshot;
pub use optimizer::{Convergence, MinimizerOptions, PerItemOptimizer, RefreshPlan, SharedRateOptimizer, UpdateRule};
pub use policy::{Admission, CachePolicy, MissType, Request};
pub use popularity::{Popularity, PopularityEstimator};
pub use rng::SimRng;
