//! In-memory plan cache shared across tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use action_primitives::{Action, ActionKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::codec::embed::{cosine, Embedder, HashingEmbedder};
use crate::codec::features;
use crate::config::CacheConfig;
use crate::errors::AdmissionError;
use crate::score;
use crate::signature::{PlanKey, PlanSignature};

pub trait ActionPlanCache: Send + Sync {
    /// Exact key first, then the most similar entry above the threshold. A near
    /// match must also share the goal closely enough on its own.
    fn lookup(&self, signature: &PlanSignature) -> Option<CacheHit>;

    /// Store a successful plan, or fold `success_rate` into an existing entry.
    fn admit(
        &self,
        signature: &PlanSignature,
        actions: &[Action],
        success_rate: f64,
    ) -> Result<Admission, AdmissionError>;

    /// Report how a replayed plan went. Returns the updated rate, `None` once removed.
    fn record_outcome(&self, key: &PlanKey, success: bool) -> Option<f64>;

    fn get(&self, key: &PlanKey) -> Option<CachedActionPlan>;

    fn stats(&self) -> CacheStats;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Snapshot of a stored plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedActionPlan {
    pub key: PlanKey,
    pub signature: PlanSignature,
    pub actions: Vec<Action>,
    pub success_rate: f64,
    pub observations: u32,
    pub usage: u64,
    pub last_used: u64,
    #[serde(skip)]
    vector: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CacheHit {
    pub key: PlanKey,
    pub actions: Vec<Action>,
    /// 1.0 for an exact key match.
    pub similarity: f32,
    pub exact: bool,
    pub success_rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Inserted,
    Updated,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub similarity_hits: u64,
    pub misses: u64,
    pub admissions: u64,
    pub rejections: u64,
    pub evictions: u64,
    pub demotions: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    similarity_hits: AtomicU64,
    misses: AtomicU64,
    admissions: AtomicU64,
    rejections: AtomicU64,
    evictions: AtomicU64,
    demotions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Entry updates go through the map's per-key lock, so concurrent outcomes on
/// one key never lose an observation.
pub struct InMemoryPlanCache {
    config: CacheConfig,
    embedder: HashingEmbedder,
    entries: DashMap<PlanKey, CachedActionPlan>,
    clock: AtomicU64,
    counters: Counters,
}

impl Default for InMemoryPlanCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl InMemoryPlanCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            embedder: HashingEmbedder::new(config.dimensions),
            config,
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn now(&self) -> u64 {
        self.clock.load(Ordering::Relaxed)
    }

    fn embed(&self, signature: &PlanSignature) -> Vec<f32> {
        self.embedder.encode(&features::from_signature(signature))
    }

    fn touch(&self, key: &PlanKey, similarity: f32, exact: bool) -> Option<CacheHit> {
        let tick = self.tick();
        let mut entry = self.entries.get_mut(key)?;
        entry.usage += 1;
        entry.last_used = tick;
        Some(CacheHit {
            key: key.clone(),
            actions: entry.actions.clone(),
            similarity,
            exact,
            success_rate: entry.success_rate,
        })
    }

    /// Most similar entry whose goal alone also clears the threshold.
    fn nearest(&self, signature: &PlanSignature, vector: &[f32]) -> Option<(PlanKey, f32)> {
        let threshold = self.config.similarity_threshold;
        self.entries
            .iter()
            .filter(|entry| features::goal_similarity(&signature.goal, &entry.signature.goal) >= threshold)
            .map(|entry| (entry.key().clone(), cosine(vector, &entry.vector)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Drops lowest-value entries until the cache fits, never `keep`.
    fn enforce_capacity(&self, keep: &PlanKey) {
        while self.entries.len() > self.config.capacity {
            let now = self.now();
            let victim = self
                .entries
                .iter()
                .filter(|entry| entry.key() != keep)
                .map(|entry| {
                    let age = now.saturating_sub(entry.last_used);
                    let value = score::eviction_value(entry.success_rate, age, self.config.recency_half_life);
                    (entry.key().clone(), value)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let Some((key, value)) = victim else {
                break;
            };
            if self.entries.remove(&key).is_some() {
                bump(&self.counters.evictions);
                debug!(key = %key, value, "evicted cached plan");
            }
        }
    }
}

impl ActionPlanCache for InMemoryPlanCache {
    fn lookup(&self, signature: &PlanSignature) -> Option<CacheHit> {
        if !self.config.enabled {
            return None;
        }
        let key = signature.key();
        if let Some(hit) = self.touch(&key, 1.0, true) {
            bump(&self.counters.hits);
            return Some(hit);
        }

        let vector = self.embed(signature);
        let near = self
            .nearest(signature, &vector)
            .filter(|(_, similarity)| *similarity >= self.config.similarity_threshold)
            .and_then(|(key, similarity)| self.touch(&key, similarity, false));
        match near {
            Some(hit) => {
                bump(&self.counters.similarity_hits);
                debug!(key = %hit.key, similarity = hit.similarity, "similar plan found");
                Some(hit)
            }
            None => {
                bump(&self.counters.misses);
                None
            }
        }
    }

    fn admit(
        &self,
        signature: &PlanSignature,
        actions: &[Action],
        success_rate: f64,
    ) -> Result<Admission, AdmissionError> {
        let rejected = if !self.config.enabled {
            Some(AdmissionError::Disabled)
        } else if actions.is_empty() {
            Some(AdmissionError::Empty)
        } else if actions.iter().any(|a| matches!(a.kind, ActionKind::Terminate { .. })) {
            Some(AdmissionError::Terminates)
        } else if success_rate <= self.config.admission_threshold {
            Some(AdmissionError::LowSuccessRate {
                rate: success_rate,
                threshold: self.config.admission_threshold,
            })
        } else {
            None
        };
        if let Some(err) = rejected {
            bump(&self.counters.rejections);
            return Err(err);
        }

        let key = signature.key();
        let tick = self.tick();
        let admission = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.success_rate = score::running_mean(entry.success_rate, entry.observations, success_rate);
                entry.observations += 1;
                entry.last_used = tick;
                Admission::Updated
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CachedActionPlan {
                    key: key.clone(),
                    signature: signature.clone(),
                    actions: actions.to_vec(),
                    success_rate,
                    observations: 1,
                    usage: 0,
                    last_used: tick,
                    vector: self.embed(signature),
                });
                Admission::Inserted
            }
        };
        bump(&self.counters.admissions);
        if admission == Admission::Inserted {
            info!(key = %key, actions = actions.len(), "plan cached");
            self.enforce_capacity(&key);
        }
        Ok(admission)
    }

    fn record_outcome(&self, key: &PlanKey, success: bool) -> Option<f64> {
        let rate = {
            let mut entry = self.entries.get_mut(key)?;
            let sample = if success { 1.0 } else { 0.0 };
            entry.success_rate = score::running_mean(entry.success_rate, entry.observations, sample);
            entry.observations += 1;
            entry.success_rate
        };
        if rate < self.config.eviction_threshold {
            // Only demote if no one raised the rate in between.
            let removed = self
                .entries
                .remove_if(key, |_, entry| entry.success_rate < self.config.eviction_threshold);
            if removed.is_some() {
                bump(&self.counters.demotions);
                info!(key = %key, rate, "cached plan demoted");
                return None;
            }
        }
        Some(rate)
    }

    fn get(&self, key: &PlanKey) -> Option<CachedActionPlan> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            entries: self.entries.len(),
            hits: load(&self.counters.hits),
            similarity_hits: load(&self.counters.similarity_hits),
            misses: load(&self.counters.misses),
            admissions: load(&self.counters.admissions),
            rejections: load(&self.counters.rejections),
            evictions: load(&self.counters.evictions),
            demotions: load(&self.counters.demotions),
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
