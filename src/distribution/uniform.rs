//! Uniform key distribution
//!
//! Every key in `[0, max)` is equally likely. Used for bulk loads and as the
//! baseline workload.

use super::Distribution;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Uniform sampler over `[0, max)`
///
/// Uses xoshiro256++ which is fast enough to sit in front of every SUT call.
pub struct UniformDistribution {
    max: u64,
    rng: Xoshiro256PlusPlus,
}

impl UniformDistribution {
    /// Create a uniform distribution with a specific seed
    ///
    /// `max` must be nonzero.
    pub fn with_seed(max: u64, seed: u64) -> Self {
        Self {
            max,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Distribution for UniformDistribution {
    #[inline]
    fn next_key(&mut self) -> u64 {
        self.rng.gen_range(0..self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_distribution_range() {
        let mut dist = UniformDistribution::with_seed(1000, 77);
        for _ in 0..1000 {
            assert!(dist.next_key() < 1000);
        }
    }

    #[test]
    fn test_uniform_distribution_single_key() {
        let mut dist = UniformDistribution::with_seed(1, 3);
        for _ in 0..10 {
            assert_eq!(dist.next_key(), 0);
        }
    }

    #[test]
    fn test_uniform_distribution_seeded() {
        let mut dist1 = UniformDistribution::with_seed(1000, 12345);
        let mut dist2 = UniformDistribution::with_seed(1000, 12345);
        for _ in 0..100 {
            assert_eq!(dist1.next_key(), dist2.next_key());
        }
    }

    #[test]
    fn test_uniform_distribution_chi_square() {
        // 99 degrees of freedom: p = 0.001 critical value is ~148.2
        let mut dist = UniformDistribution::with_seed(100, 2024);
        let draws = 100_000;
        let mut counts = [0u64; 100];
        for _ in 0..draws {
            counts[dist.next_key() as usize] += 1;
        }

        let expected = draws as f64 / 100.0;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| {
                let d = c as f64 - expected;
                d * d / expected
            })
            .sum();

        assert!(chi_square < 160.0, "chi-square {} too large", chi_square);
        assert!(counts.iter().all(|&c| c > 0));
    }
}
