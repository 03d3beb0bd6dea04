use core::{
    cmp::Ordering,
    convert::TryFrom,
    fmt,
    hash::{Hash, Hasher},
};

use cladohist_core_maths::MathsCore;
use serde::{Deserialize, Serialize};

#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct OpenUnitF64Error(f64);

impl fmt::Display for OpenUnitF64Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{} is not in (0.0, 1.0).", self.0)
    }
}

#[derive(Copy, Clone, Deserialize, Serialize)]
#[repr(transparent)]
#[serde(try_from = "f64", into = "f64")]
pub struct OpenUnitF64(f64);

impl fmt::Display for OpenUnitF64 {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

impl TryFrom<f64> for OpenUnitF64 {
    type Error = OpenUnitF64Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OpenUnitF64> for f64 {
    fn from(val: OpenUnitF64) -> Self {
        val.get()
    }
}

impl fmt::Debug for OpenUnitF64 {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        struct OpenUnitF64Range(f64);

        impl fmt::Debug for OpenUnitF64Range {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, "0.0 < {} < 1.0", self.0)
            }
        }

        fmt.debug_tuple("OpenUnitF64")
            .field(&OpenUnitF64Range(self.0))
            .finish()
    }
}

impl OpenUnitF64 {
    /// # Errors
    ///
    /// Returns `OpenUnitF64Error` if not `0.0 < value < 1.0`
    pub const fn new(value: f64) -> Result<Self, OpenUnitF64Error> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(OpenUnitF64Error(value))
        }
    }

    #[must_use]
    pub const fn get(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn one_minus(self) -> Self {
        Self(1.0_f64 - self.0)
    }

    #[must_use]
    pub fn ln<M: MathsCore>(self) -> f64 {
        M::ln(self.0)
    }
}

impl PartialEq for OpenUnitF64 {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for OpenUnitF64 {}

impl PartialOrd for OpenUnitF64 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenUnitF64 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for OpenUnitF64 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialEq<f64> for OpenUnitF64 {
    fn eq(&self, other: &f64) -> bool {
        self.0.eq(other)
    }
}

impl PartialOrd<f64> for OpenUnitF64 {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}
