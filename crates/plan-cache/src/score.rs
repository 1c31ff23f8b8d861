//! Success-rate bookkeeping and eviction value.

/// Running mean after one more observation.
pub fn running_mean(mean: f64, observations: u32, sample: f64) -> f64 {
    let n = observations as f64;
    clamp01((mean * n + sample) / (n + 1.0))
}

/// `0.5^(age / half_life)`; a zero half-life keeps only the newest entries valuable.
pub fn recency(age_ticks: u64, half_life: u64) -> f64 {
    if half_life == 0 {
        return if age_ticks == 0 { 1.0 } else { 0.0 };
    }
    0.5f64.powf(age_ticks as f64 / half_life as f64)
}

/// Lowest value is evicted first.
pub fn eviction_value(success_rate: f64, age_ticks: u64, half_life: u64) -> f64 {
    success_rate * recency(age_ticks, half_life)
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
