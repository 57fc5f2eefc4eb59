//! Small numeric helpers shared by the inference stages.

/// Keeps `logit` finite at the ends of [0, 1].
const LOGIT_EPS: f64 = 1e-6;

pub fn clamp01(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}

/// Map [0, 1] to [-1, 1].
pub fn centered(x: f64) -> f64 {
    2.0 * clamp01(x) - 1.0
}

/// Probabilistic OR: `1 - Π(1 - x)`.
pub fn noisy_or(values: impl IntoIterator<Item = f64>) -> f64 {
    1.0 - values
        .into_iter()
        .map(|v| 1.0 - clamp01(v))
        .product::<f64>()
}

/// Softmax with max-shift for stability. A non-positive temperature is
/// treated as a tiny positive one.
pub fn softmax(values: &[f64], temperature: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let t = temperature.max(1e-6);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = values.iter().map(|v| ((v - max) / t).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Leaky integration of `x` toward `target` at `rate`.
pub fn leak(x: f64, target: f64, rate: f64) -> f64 {
    x + (target - x) * rate.clamp(0.0, 1.0)
}
