use core::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign},
};

use serde::{Deserialize, Serialize};

/// Log-probability of a tree or history, with impossibility as an explicit
/// variant instead of a sentinel value.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LnProbability {
    Finite(f64),
    Impossible,
}

impl LnProbability {
    #[must_use]
    pub const fn certain() -> Self {
        Self::Finite(0.0_f64)
    }

    /// Maps negative infinity and NaN to [`LnProbability::Impossible`].
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() || value == f64::NEG_INFINITY {
            Self::Impossible
        } else {
            Self::Finite(value)
        }
    }

    #[must_use]
    pub const fn is_impossible(self) -> bool {
        matches!(self, Self::Impossible)
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        match self {
            Self::Finite(value) => value,
            Self::Impossible => f64::NEG_INFINITY,
        }
    }
}

impl Default for LnProbability {
    fn default() -> Self {
        Self::certain()
    }
}

impl From<f64> for LnProbability {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<LnProbability> for f64 {
    fn from(value: LnProbability) -> Self {
        value.get()
    }
}

impl Add for LnProbability {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        match (self, other) {
            (Self::Finite(a), Self::Finite(b)) => Self::new(a + b),
            _ => Self::Impossible,
        }
    }
}

impl Add<f64> for LnProbability {
    type Output = Self;

    fn add(self, other: f64) -> Self {
        self + Self::new(other)
    }
}

impl AddAssign for LnProbability {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl AddAssign<f64> for LnProbability {
    fn add_assign(&mut self, other: f64) {
        *self = *self + other;
    }
}

impl Sum for LnProbability {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::certain(), Add::add)
    }
}

impl fmt::Display for LnProbability {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Finite(value) => fmt::Display::fmt(value, fmt),
            Self::Impossible => fmt.write_str("-inf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LnProbability;

    #[test]
    fn impossibility_is_absorbing() {
        let p = LnProbability::new(-1.5_f64) + LnProbability::Impossible;

        assert!(p.is_impossible());
        assert_eq!(p.get(), f64::NEG_INFINITY);
        assert_eq!(
            LnProbability::new(-1.5_f64) + 0.5_f64,
            LnProbability::Finite(-1.0_f64)
        );
        assert!((LnProbability::certain() + f64::NEG_INFINITY).is_impossible());
    }

    #[test]
    fn non_finite_values_are_impossible() {
        assert!(LnProbability::new(f64::NEG_INFINITY).is_impossible());
        assert!(LnProbability::new(f64::NAN).is_impossible());
        assert_eq!(LnProbability::new(-2.0_f64).get(), -2.0_f64);

        let total: LnProbability = [-1.0_f64, -2.0_f64]
            .into_iter()
            .map(LnProbability::new)
            .sum();
        assert_eq!(total, LnProbability::Finite(-3.0_f64));
    }
}
