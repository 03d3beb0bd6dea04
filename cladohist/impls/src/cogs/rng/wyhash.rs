use serde::{Deserialize, Serialize};

use cladohist_core::cogs::RngCore;

#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WyHash {
    seed: u64,
    state: u64,
}

impl RngCore for WyHash {
    type Seed = [u8; 8];

    #[must_use]
    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        let seed = u64::from_le_bytes(seed);

        Self { seed, state: seed }
    }

    #[must_use]
    #[inline]
    fn sample_u64(&mut self) -> u64 {
        // Added SeaHash diffuse for better avalanching
        diffuse(wyhash::wyrng(&mut self.state))
    }
}

impl WyHash {
    /// Derives an independent generator for a replicate chain.
    #[must_use]
    pub fn split_to_stream(&self, stream: u64) -> Self {
        let state = wyhash::wyhash(&stream.to_le_bytes(), self.seed);

        Self {
            seed: self.seed,
            state,
        }
    }
}

const fn diffuse(mut x: u64) -> u64 {
    // Dynamic shifts from the PCG round: the high bits choose the shift, so
    // flipping them flips the lower bits, which the multiplication then
    // scatters upwards.
    x = x.wrapping_mul(0x6eed_0e9d_a4d9_4a4f);

    let a = x >> 32;
    let b = x >> 60;

    x ^= a >> b;

    x = x.wrapping_mul(0x6eed_0e9d_a4d9_4a4f);

    x
}

#[cfg(test)]
mod tests {
    use cladohist_core::cogs::{RngCore, RngSampler, SeedableRng};
    use cladohist_core_bond::PositiveF64;
    use cladohist_core_maths::StdMathsCore;

    use super::WyHash;

    #[test]
    fn seeding_is_reproducible() {
        let mut a = WyHash::seed_from_u64(42);
        let mut b = WyHash::seed_from_u64(42);
        let mut c = WyHash::seed_from_u64(43);

        let xs: Vec<u64> = (0..8).map(|_| a.sample_u64()).collect();
        let ys: Vec<u64> = (0..8).map(|_| b.sample_u64()).collect();
        let zs: Vec<u64> = (0..8).map(|_| c.sample_u64()).collect();

        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
    }

    #[test]
    fn streams_are_distinct() {
        let rng = WyHash::seed_from_u64(7);

        let mut a = rng.split_to_stream(0);
        let mut b = rng.split_to_stream(1);

        assert_ne!(a.sample_u64(), b.sample_u64());
    }

    #[test]
    fn sample_means_are_plausible() {
        let mut rng = WyHash::seed_from_u64(1);
        let n = 20_000;

        let uniform: f64 = (0..n)
            .map(|_| rng.sample_uniform_closed_open().get())
            .sum::<f64>()
            / f64::from(n);
        assert!((uniform - 0.5_f64).abs() < 0.02_f64, "{uniform}");

        let lambda = PositiveF64::new(2.0_f64).unwrap();
        let exponential: f64 = (0..n)
            .map(|_| rng.sample_exponential::<StdMathsCore>(lambda).get())
            .sum::<f64>()
            / f64::from(n);
        assert!((exponential - 0.5_f64).abs() < 0.03_f64, "{exponential}");

        let alpha = PositiveF64::new(2.0_f64).unwrap();
        let beta = PositiveF64::new(6.0_f64).unwrap();
        let beta_mean: f64 = (0..n)
            .map(|_| rng.sample_beta::<StdMathsCore>(alpha, beta))
            .sum::<f64>()
            / f64::from(n);
        assert!((beta_mean - 0.25_f64).abs() < 0.02_f64, "{beta_mean}");

        let small = PositiveF64::new(0.5_f64).unwrap();
        let gamma_mean: f64 = (0..n)
            .map(|_| rng.sample_gamma::<StdMathsCore>(small))
            .sum::<f64>()
            / f64::from(n);
        assert!((gamma_mean - 0.5_f64).abs() < 0.05_f64, "{gamma_mean}");
    }

    #[test]
    fn weighted_index_skips_zero_weights() {
        let mut rng = WyHash::seed_from_u64(3);

        for _ in 0..100 {
            assert_eq!(rng.sample_weighted_index(&[0.0_f64, 2.0_f64, 0.0_f64]), Some(1));
        }

        assert_eq!(rng.sample_weighted_index(&[0.0_f64, 0.0_f64]), None);
    }
}
