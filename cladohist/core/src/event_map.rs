use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cladohist_core_bond::ClosedUnitF64;

use crate::error::HistoryError;

/// A cladogenetic split `(ancestor, left, right)` of the ancestral state into
/// the states of the two daughter lineages.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Split {
    pub ancestor: usize,
    pub left: usize,
    pub right: usize,
}

impl Split {
    #[must_use]
    pub const fn new(ancestor: usize, left: usize, right: usize) -> Self {
        Self {
            ancestor,
            left,
            right,
        }
    }
}

/// Sparse map from cladogenetic splits to their probabilities. The rows for
/// each ancestor are expected, but not required, to sum to one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct CladogeneticEventMap {
    num_states: usize,
    events: BTreeMap<Split, ClosedUnitF64>,
}

impl CladogeneticEventMap {
    #[must_use]
    pub fn empty(num_states: usize) -> Self {
        Self {
            num_states,
            events: BTreeMap::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `HistoryError::StateOutOfRange` if any split refers to a state
    /// that is not below `num_states`.
    pub fn new<I: IntoIterator<Item = (Split, ClosedUnitF64)>>(
        num_states: usize,
        events: I,
    ) -> Result<Self, HistoryError> {
        let mut map = Self::empty(num_states);

        for (split, probability) in events {
            for state in [split.ancestor, split.left, split.right] {
                if state >= num_states {
                    return Err(HistoryError::StateOutOfRange { state, num_states });
                }
            }

            map.events.insert(split, probability);
        }

        Ok(map)
    }

    /// The split map where every lineage keeps its ancestral state.
    #[must_use]
    pub fn identity(num_states: usize) -> Self {
        Self {
            num_states,
            events: (0..num_states)
                .map(|state| (Split::new(state, state, state), ClosedUnitF64::one()))
                .collect(),
        }
    }

    #[must_use]
    pub const fn num_states(&self) -> usize {
        self.num_states
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn probability(&self, split: Split) -> f64 {
        self.events.get(&split).map_or(0.0_f64, |p| p.get())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Split, f64)> + '_ {
        self.events.iter().map(|(split, p)| (*split, p.get()))
    }

    /// All splits of the given `ancestor` state.
    pub fn splits_from(&self, ancestor: usize) -> impl Iterator<Item = (Split, f64)> + '_ {
        self.events
            .range(Split::new(ancestor, 0, 0)..=Split::new(ancestor, usize::MAX, usize::MAX))
            .map(|(split, p)| (*split, p.get()))
    }
}

/// How cladogenetic split probabilities are assigned to the internal nodes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CladogenesisModel {
    /// One map shared by every internal node.
    Homogeneous(CladogeneticEventMap),
    /// One map per node, indexed by node index.
    Heterogeneous(Vec<CladogeneticEventMap>),
}

impl CladogenesisModel {
    #[must_use]
    pub fn for_node(&self, node: usize) -> Option<&CladogeneticEventMap> {
        match self {
            Self::Homogeneous(map) => Some(map),
            Self::Heterogeneous(maps) => maps.get(node),
        }
    }
}

#[cfg(test)]
mod tests {
    use cladohist_core_bond::ClosedUnitF64;

    use crate::error::HistoryError;

    use super::{CladogenesisModel, CladogeneticEventMap, Split};

    fn p(value: f64) -> ClosedUnitF64 {
        ClosedUnitF64::new(value).unwrap()
    }

    #[test]
    fn rejects_out_of_range_states() {
        assert_eq!(
            CladogeneticEventMap::new(2, [(Split::new(0, 0, 2), p(1.0_f64))]),
            Err(HistoryError::StateOutOfRange {
                state: 2,
                num_states: 2
            })
        );
    }

    #[test]
    fn splits_from_selects_ancestor_rows() {
        let map = CladogeneticEventMap::new(
            3,
            [
                (Split::new(0, 0, 0), p(1.0_f64)),
                (Split::new(1, 1, 2), p(0.5_f64)),
                (Split::new(1, 2, 1), p(0.5_f64)),
                (Split::new(2, 2, 2), p(1.0_f64)),
            ],
        )
        .unwrap();

        let row: Vec<_> = map.splits_from(1).collect();

        assert_eq!(
            row,
            vec![(Split::new(1, 1, 2), 0.5_f64), (Split::new(1, 2, 1), 0.5_f64)]
        );
        assert_eq!(map.probability(Split::new(0, 1, 1)), 0.0_f64);
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn heterogeneous_model_is_per_node() {
        let model = CladogenesisModel::Heterogeneous(vec![
            CladogeneticEventMap::identity(2),
            CladogeneticEventMap::empty(2),
        ]);

        assert_eq!(model.for_node(0).map(CladogeneticEventMap::len), Some(2));
        assert!(model.for_node(1).map_or(false, CladogeneticEventMap::is_empty));
        assert!(model.for_node(2).is_none());
    }
}
