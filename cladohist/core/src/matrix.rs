use core::{
    fmt,
    ops::{Index, IndexMut, Mul, MulAssign},
};

use serde::{Deserialize, Serialize};

/// Dense, row-major square matrix of transition probabilities, where
/// `m[(from, to)]` is the probability of ending in `to` given `from`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    num_states: usize,
    values: Vec<f64>,
}

impl TransitionMatrix {
    #[must_use]
    pub fn zeros(num_states: usize) -> Self {
        Self {
            num_states,
            values: vec![0.0_f64; num_states * num_states],
        }
    }

    #[must_use]
    pub fn identity(num_states: usize) -> Self {
        let mut matrix = Self::zeros(num_states);

        for state in 0..num_states {
            matrix[(state, state)] = 1.0_f64;
        }

        matrix
    }

    #[must_use]
    pub fn from_fn<F: FnMut(usize, usize) -> f64>(num_states: usize, mut entry: F) -> Self {
        let mut values = Vec::with_capacity(num_states * num_states);

        for from in 0..num_states {
            for to in 0..num_states {
                values.push(entry(from, to));
            }
        }

        Self { num_states, values }
    }

    /// Returns `None` unless all rows have the same length as the number of
    /// rows.
    #[must_use]
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let num_states = rows.len();

        if rows.iter().any(|row| row.len() != num_states) {
            return None;
        }

        Some(Self {
            num_states,
            values: rows.iter().flatten().copied().collect(),
        })
    }

    #[must_use]
    pub const fn num_states(&self) -> usize {
        self.num_states
    }

    #[must_use]
    pub fn row(&self, from: usize) -> &[f64] {
        &self.values[from * self.num_states..(from + 1) * self.num_states]
    }

    /// Computes `out[from] = sum_to m[from][to] * vector[to]`, i.e. pushes
    /// conditional likelihoods at the end of a branch to its start.
    #[debug_requires(vector.len() == self.num_states, "vector has one entry per state")]
    #[debug_requires(out.len() == self.num_states, "out has one entry per state")]
    pub fn apply(&self, vector: &[f64], out: &mut [f64]) {
        for (from, out) in out.iter_mut().enumerate() {
            *out = self
                .row(from)
                .iter()
                .zip(vector)
                .map(|(p, v)| p * v)
                .sum();
        }
    }

    /// Computes `out[to] = sum_from vector[from] * m[from][to]`, i.e. pushes
    /// probabilities at the start of a branch to its end.
    #[debug_requires(vector.len() == self.num_states, "vector has one entry per state")]
    #[debug_requires(out.len() == self.num_states, "out has one entry per state")]
    pub fn apply_transposed(&self, vector: &[f64], out: &mut [f64]) {
        out.fill(0.0_f64);

        for (from, weight) in vector.iter().enumerate() {
            for (out, p) in out.iter_mut().zip(self.row(from)) {
                *out += weight * p;
            }
        }
    }

    #[must_use]
    pub fn approx_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.num_states == other.num_states
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Index<(usize, usize)> for TransitionMatrix {
    type Output = f64;

    fn index(&self, (from, to): (usize, usize)) -> &Self::Output {
        &self.values[from * self.num_states + to]
    }
}

impl IndexMut<(usize, usize)> for TransitionMatrix {
    fn index_mut(&mut self, (from, to): (usize, usize)) -> &mut Self::Output {
        &mut self.values[from * self.num_states + to]
    }
}

impl Mul for &TransitionMatrix {
    type Output = TransitionMatrix;

    fn mul(self, other: Self) -> TransitionMatrix {
        assert_eq!(
            self.num_states, other.num_states,
            "matrices must have the same dimension"
        );

        let n = self.num_states;
        let mut product = TransitionMatrix::zeros(n);

        for i in 0..n {
            for k in 0..n {
                let a = self[(i, k)];

                if a == 0.0_f64 {
                    continue;
                }

                for j in 0..n {
                    product[(i, j)] += a * other[(k, j)];
                }
            }
        }

        product
    }
}

impl Mul for TransitionMatrix {
    type Output = TransitionMatrix;

    fn mul(self, other: Self) -> TransitionMatrix {
        &self * &other
    }
}

impl MulAssign<&TransitionMatrix> for TransitionMatrix {
    fn mul_assign(&mut self, other: &TransitionMatrix) {
        *self = &*self * other;
    }
}

impl fmt::Debug for TransitionMatrix {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        struct Rows<'m>(&'m TransitionMatrix);

        impl<'m> fmt::Debug for Rows<'m> {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                fmt.debug_list()
                    .entries((0..self.0.num_states).map(|from| self.0.row(from)))
                    .finish()
            }
        }

        fmt.debug_tuple("TransitionMatrix")
            .field(&Rows(self))
            .finish()
    }
}
