use rand::Rng;

/// Clamps `value` into the inclusive range `[lo, hi]`.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// A uniform random value in `[lo, hi)`.
pub fn random_between(lo: f64, hi: f64) -> f64 {
    rand::rng().random_range(lo..hi)
}

/// Approximates a Gaussian sample with mean `mu` and standard deviation `sigma`
/// via the Irwin-Hall method: the sum of `n` uniform(0,1) draws, rescaled.
///
/// With `n` draws the sum has mean `n/2` and variance `n/12`; shifting and
/// scaling that to `(mu, sigma)` gives a cheap bell-shaped approximation
/// without pulling in a full normal-distribution dependency.
pub fn gaussian(mu: f64, sigma: f64, n: usize) -> f64 {
    let n = n.max(1);
    let mut rng = rand::rng();
    let sum: f64 = (0..n).map(|_| rng.random::<f64>()).sum();
    let n_f = n as f64;
    let standardized = (sum - n_f / 2.0) / (n_f / 12.0).sqrt();
    mu + sigma * standardized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp(-5.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp(15.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn random_between_in_range() {
        for _ in 0..100 {
            let v = random_between(1.0, 2.0);
            assert!((1.0..2.0).contains(&v));
        }
    }

    #[test]
    fn gaussian_default_n_is_approximately_centred() {
        let samples: Vec<f64> = (0..2000).map(|_| gaussian(0.0, 1.0, 6)).collect();
        let mean: f64 = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.2, "mean {mean} should be near 0");
    }
}
