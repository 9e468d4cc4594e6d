//! Log-normal latency sampler fit to configured (p50, p95) targets.

use std::f64::consts::TAU;
use std::time::Duration;

use super::rng::Rng;

/// 95th-percentile quantile of the standard normal distribution.
const Z95: f64 = 1.644_853_626_951_472_2;

const MIN_LATENCY_NANOS: f64 = 1_000.0;

/// Samples latencies from a log-normal distribution with
/// `μ = ln(p50)` and `σ = max(0.01, (ln(p95) − μ) / z95)`.
#[derive(Clone, Copy, Debug)]
pub struct LatencySampler {
    mu: f64,
    sigma: f64,
}

impl LatencySampler {
    pub fn new(p50: Duration, p95: Duration) -> Self {
        let mu = (p50.as_nanos() as f64).ln();
        let sigma = ((p95.as_nanos() as f64).ln() - mu) / Z95;
        LatencySampler {
            mu,
            sigma: sigma.max(0.01),
        }
    }

    /// Draws one latency via Box–Muller, floored at 1 µs.
    pub fn sample(&self, rng: &Rng) -> Duration {
        let u1 = rng.f64().max(1e-9);
        let u2 = rng.f64();
        let z = (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos();
        let nanos = (self.mu + self.sigma * z).exp().max(MIN_LATENCY_NANOS);
        Duration::from_nanos(nanos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_never_goes_below_one_microsecond() {
        let sampler = LatencySampler::new(Duration::from_nanos(10), Duration::from_nanos(20));
        let rng = Rng::new(3);
        for _ in 0..1_000 {
            assert!(sampler.sample(&rng) >= Duration::from_micros(1));
        }
    }

    #[test]
    fn sigma_has_a_floor_for_degenerate_percentiles() {
        // p50 == p95 would otherwise give sigma 0
        let sampler = LatencySampler::new(Duration::from_millis(10), Duration::from_millis(10));
        assert_eq!(sampler.sigma, 0.01);
    }

    #[test]
    fn median_tracks_p50() {
        let p50 = Duration::from_millis(30);
        let sampler = LatencySampler::new(p50, Duration::from_millis(120));
        let rng = Rng::new(11);
        let mut samples: Vec<Duration> = (0..4_000).map(|_| sampler.sample(&rng)).collect();
        samples.sort();
        let median = samples[samples.len() / 2];
        let ratio = median.as_secs_f64() / p50.as_secs_f64();
        assert!((0.8..1.25).contains(&ratio), "median {median:?} vs p50 {p50:?}");
    }

    #[test]
    fn deterministic_for_equal_seeds() {
        let sampler = LatencySampler::new(Duration::from_millis(30), Duration::from_millis(120));
        let a = Rng::new(5);
        let b = Rng::new(5);
        for _ in 0..128 {
            assert_eq!(sampler.sample(&a), sampler.sample(&b));
        }
    }
}
