use core::convert::AsMut;

use serde::{de::DeserializeOwned, Serialize};

use cladohist_core_bond::{ClosedOpenUnitF64, ClosedUnitF64, NonNegativeF64, PositiveF64};

use crate::cogs::MathsCore;

#[allow(clippy::module_name_repetitions)]
pub trait RngCore: Sized + Clone + core::fmt::Debug + Serialize + DeserializeOwned {
    type Seed: AsMut<[u8]> + Default + Sized;

    #[must_use]
    fn from_seed(seed: Self::Seed) -> Self;

    #[must_use]
    fn sample_u64(&mut self) -> u64;
}

#[allow(clippy::module_name_repetitions)]
pub trait SeedableRng: RngCore {
    #[must_use]
    fn seed_from_u64(mut state: u64) -> Self {
        // We use PCG32 to generate a u32 sequence, and copy to the seed
        const MUL: u64 = 6_364_136_223_846_793_005_u64;
        const INC: u64 = 11_634_580_027_462_260_723_u64;

        let mut seed = Self::Seed::default();

        for chunk in seed.as_mut().chunks_mut(4) {
            // We advance the state first (to get away from the input value,
            // in case it has low Hamming Weight).
            state = state.wrapping_mul(MUL).wrapping_add(INC);

            // Use PCG output function with to_le to generate x:
            #[allow(clippy::cast_possible_truncation)]
            let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
            #[allow(clippy::cast_possible_truncation)]
            let rot = (state >> 59) as u32;
            let x = xorshifted.rotate_right(rot).to_le_bytes();

            chunk.copy_from_slice(&x[..chunk.len()]);
        }

        Self::from_seed(seed)
    }
}

impl<R: RngCore> SeedableRng for R {}

/// Distribution sampling on top of any [`RngCore`].
#[allow(clippy::module_name_repetitions)]
pub trait RngSampler: RngCore {
    #[must_use]
    #[inline]
    fn sample_uniform_closed_open(&mut self) -> ClosedOpenUnitF64 {
        // http://prng.di.unimi.it -> Generating uniform doubles in the unit interval
        #[allow(clippy::cast_precision_loss)]
        let u01 = ((self.sample_u64() >> 11) as f64) * f64::from_bits(0x3CA0_0000_0000_0000_u64); // 0x1.0p-53

        ClosedOpenUnitF64::new(u01).unwrap_or_else(|_| unreachable!("53 bit uniform is in [0, 1)"))
    }

    #[must_use]
    #[inline]
    #[debug_ensures(ret > 0.0_f64 && ret <= 1.0_f64, "samples U(0.0, 1.0]")]
    fn sample_uniform_open_closed(&mut self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let u01 =
            (((self.sample_u64() >> 11) + 1) as f64) * f64::from_bits(0x3CA0_0000_0000_0000_u64);

        u01
    }

    #[must_use]
    #[debug_requires(length > 0, "length > 0")]
    #[debug_ensures(ret < length, "samples U(0, length - 1)")]
    fn sample_index(&mut self, length: usize) -> usize {
        // attributes on expressions are experimental
        // see https://github.com/rust-lang/rust/issues/15701
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let index = (self.sample_uniform_closed_open().get() * (length as f64)).floor() as usize;
        index.min(length - 1)
    }

    #[must_use]
    fn sample_exponential<M: MathsCore>(&mut self, lambda: PositiveF64) -> NonNegativeF64 {
        let exp = -M::ln(self.sample_uniform_open_closed()) / lambda.get();

        NonNegativeF64::new(exp).unwrap_or_else(|_| NonNegativeF64::zero())
    }

    #[must_use]
    fn sample_event(&mut self, probability: ClosedUnitF64) -> bool {
        self.sample_uniform_closed_open().get() < probability.get()
    }

    /// Draws two independent standard normal samples with the Box-Muller
    /// transform.
    #[must_use]
    fn sample_2d_standard_normal<M: MathsCore>(&mut self) -> (f64, f64) {
        let u0 = self.sample_uniform_open_closed();
        let u1 = self.sample_uniform_closed_open().get();

        let r = M::sqrt(-2.0_f64 * M::ln(u0));
        let theta = -core::f64::consts::TAU * u1;

        (r * M::sin(theta), r * M::cos(theta))
    }

    #[must_use]
    fn sample_normal<M: MathsCore>(&mut self, mu: f64, sigma: NonNegativeF64) -> f64 {
        let (z, _) = self.sample_2d_standard_normal::<M>();

        mu + z * sigma.get()
    }

    /// Marsaglia and Tsang's squeeze method, boosted for shapes below one.
    #[must_use]
    #[debug_ensures(ret >= 0.0_f64, "samples Gamma(shape, 1)")]
    fn sample_gamma<M: MathsCore>(&mut self, shape: PositiveF64) -> f64 {
        if shape < 1.0_f64 {
            let boost = M::pow(self.sample_uniform_open_closed(), 1.0_f64 / shape.get());
            let boosted = PositiveF64::new(shape.get() + 1.0_f64)
                .unwrap_or_else(|_| unreachable!("shape + 1 is positive"));

            return self.sample_gamma::<M>(boosted) * boost;
        }

        let d = shape.get() - 1.0_f64 / 3.0_f64;
        let c = 1.0_f64 / M::sqrt(9.0_f64 * d);

        loop {
            let (x, _) = self.sample_2d_standard_normal::<M>();
            let v = 1.0_f64 + c * x;

            if v <= 0.0_f64 {
                continue;
            }

            let v = v * v * v;
            let u = self.sample_uniform_open_closed();

            if M::ln(u) < 0.5_f64 * x * x + d - d * v + d * M::ln(v) {
                return d * v;
            }
        }
    }

    /// Samples Beta(`alpha`, `beta`) as a ratio of Gamma samples. The result
    /// can round to exactly 0 or 1 for extreme shapes.
    #[must_use]
    fn sample_beta<M: MathsCore>(&mut self, alpha: PositiveF64, beta: PositiveF64) -> f64 {
        let x = self.sample_gamma::<M>(alpha);
        let y = self.sample_gamma::<M>(beta);

        x / (x + y)
    }

    /// Samples an index with probability proportional to its weight, or
    /// `None` if all weights are zero.
    #[must_use]
    fn sample_weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().sum();

        if total <= 0.0_f64 || !total.is_finite() {
            return None;
        }

        let target = self.sample_uniform_closed_open().get() * total;
        let mut cumulative = 0.0_f64;

        for (index, weight) in weights.iter().enumerate() {
            cumulative += weight;

            if target < cumulative {
                return Some(index);
            }
        }

        // Rounding can leave the target just above the last cumulative sum
        weights.iter().rposition(|weight| *weight > 0.0_f64)
    }
}

impl<R: RngCore> RngSampler for R {}
