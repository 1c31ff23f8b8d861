//! Action plan cache
//!
//! Plans that worked on a page are stored under a signature of that page and
//! the goal, and offered again for the same or a sufficiently similar context.

pub mod cache;
pub mod codec;
pub mod config;
pub mod errors;
pub mod score;
pub mod signature;

pub use cache::{ActionPlanCache, Admission, CacheHit, CacheStats, CachedActionPlan, InMemoryPlanCache};
pub use config::CacheConfig;
pub use errors::AdmissionError;
pub use signature::{goal_signature, structural_fingerprint, url_pattern, PlanKey, PlanSignature};
