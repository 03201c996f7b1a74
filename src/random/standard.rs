//! This module implements DistributionSource on top of the abstractions of
//! the standard "rand" crate.

use super::DistributionSource;
use crate::numeric::Float;
use num_traits::ToPrimitive;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};

// Select random number generation engine in use
#[cfg(feature = "f32")]
type Engine = rand_xoshiro::Xoshiro128Plus;
#[cfg(not(feature = "f32"))]
type Engine = rand_xoshiro::Xoshiro256Plus;

/// Poisson arrivals and uniformly spread service times
///
/// Service times are drawn uniformly from `mean ± variance`, which is how the
/// interactive display describes them ("1.0s ± 0.3s").
#[derive(Clone, Debug)]
pub struct StandardSource {
    rng: Engine,
}
//
impl StandardSource {
    /// Spawn a new generator seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: Engine::from_entropy(),
        }
    }

    /// Spawn a generator with a fixed seed, for statistical tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Engine::seed_from_u64(seed),
        }
    }
}

impl Default for StandardSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionSource for StandardSource {
    fn arrivals(&mut self, expected: Float) -> u64 {
        // Poisson::new rejects a zero or non-finite mean, and for those we
        // have no arrivals to report anyway
        match Poisson::new(expected) {
            Ok(poisson) => {
                let draw: Float = poisson.sample(&mut self.rng);
                draw.to_u64().unwrap_or(u64::MAX)
            }
            Err(_) => 0,
        }
    }

    fn service_time(&mut self, mean: Float, variance: Float) -> Float {
        if variance > 0. {
            self.rng.gen_range((mean - variance)..=(mean + variance))
        } else {
            mean
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::count_to_float;

    #[test]
    fn zero_expectation_means_no_arrivals() {
        let mut source = StandardSource::seeded(7);
        for _ in 0..100 {
            assert_eq!(source.arrivals(0.), 0);
        }
    }

    #[test]
    fn arrival_counts_average_to_the_expectation() {
        let mut source = StandardSource::seeded(42);
        let draws = 20_000u64;
        let total: u64 = (0..draws).map(|_| source.arrivals(2.5)).sum();
        let mean = count_to_float(total) / count_to_float(draws);
        assert!((mean - 2.5).abs() < 0.1, "sample mean was {mean}");
    }

    #[test]
    fn service_times_stay_within_the_spread() {
        let mut source = StandardSource::seeded(3);
        for _ in 0..1_000 {
            let t = source.service_time(1.0, 0.3);
            assert!((0.7..=1.3).contains(&t), "{t} out of range");
        }
    }

    #[test]
    fn zero_variance_is_deterministic() {
        let mut source = StandardSource::seeded(3);
        assert_eq!(source.service_time(0.75, 0.), 0.75);
    }
}
