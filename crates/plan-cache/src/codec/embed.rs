use sha2::{Digest, Sha256};

use crate::codec::features::FeatureMap;

pub trait Embedder: Send + Sync {
    fn encode(&self, features: &FeatureMap) -> Vec<f32>;
}

/// Feature hashing into a fixed number of buckets, L2-normalized.
#[derive(Clone, Debug)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim.max(16)
    }
}

impl Embedder for HashingEmbedder {
    fn encode(&self, features: &FeatureMap) -> Vec<f32> {
        let dim = self.dim();
        let mut vec = vec![0.0; dim];
        for (name, weight) in features {
            vec[bucket(name, dim)] += *weight;
        }
        let norm = l2(&vec);
        if norm > 0.0 {
            vec.iter_mut().for_each(|v| *v /= norm);
        }
        vec
    }
}

fn bucket(name: &str, dim: usize) -> usize {
    let digest = Sha256::digest(name.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(head) % dim as u64) as usize
}

fn l2(vec: &[f32]) -> f32 {
    vec.iter().map(|v| v * v).sum::<f32>().sqrt()
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (norm_a, norm_b) = (l2(a), l2(b));
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}
