use serde::{Deserialize, Serialize};

/// Plan cache configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entries kept before the least valuable one is evicted.
    pub capacity: usize,
    /// Minimum cosine similarity for a near match, applied both to the whole
    /// signature and to the goal words alone.
    pub similarity_threshold: f32,
    /// A plan is stored only when its observed success rate is strictly above this.
    pub admission_threshold: f64,
    /// Entries whose running success rate drops below this are removed.
    pub eviction_threshold: f64,
    /// Ticks of the logical clock after which recency halves.
    pub recency_half_life: u64,
    pub dimensions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 512,
            similarity_threshold: 0.85,
            admission_threshold: 0.8,
            eviction_threshold: 0.5,
            recency_half_life: 256,
            dimensions: 64,
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_half_life(mut self, ticks: u64) -> Self {
        self.recency_half_life = ticks;
        self
    }
}
