use core::fmt;

use serde::{Deserialize, Serialize};

use cladohist_core::error::LikelihoodError;

/// An observed discrete character, stored as the bit mask of all states it
/// is compatible with. Ambiguous and missing observations set several bits.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscreteCharacter(u64);

impl DiscreteCharacter {
    /// The single `state` out of `num_states`, or `None` if it is out of
    /// range.
    #[must_use]
    pub const fn state(state: usize, num_states: usize) -> Option<Self> {
        if state < num_states && state < 64 {
            Some(Self(1_u64 << state))
        } else {
            None
        }
    }

    /// A gap or missing observation, compatible with every state.
    #[must_use]
    pub const fn missing(num_states: usize) -> Self {
        if num_states >= 64 {
            Self(u64::MAX)
        } else {
            Self((1_u64 << num_states) - 1)
        }
    }

    #[must_use]
    pub const fn from_mask(mask: u64) -> Self {
        Self(mask)
    }

    /// Parses `0`-`9` and `A`-`Z` (for the states 10 to 35) as single
    /// states and `?`, `-`, and `N` as missing.
    #[must_use]
    pub fn from_symbol(symbol: char, num_states: usize) -> Option<Self> {
        match symbol {
            '?' | '-' | 'N' => Some(Self::missing(num_states)),
            symbol => symbol
                .to_digit(36)
                .and_then(|state| Self::state(state as usize, num_states)),
        }
    }

    #[must_use]
    pub const fn mask(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_compatible(self, state: usize) -> bool {
        state < 64 && (self.0 >> state) & 1 == 1
    }

    #[must_use]
    pub const fn is_ambiguous(self) -> bool {
        self.0.count_ones() > 1
    }

    /// The single observed state, if the character is unambiguous.
    #[must_use]
    pub const fn unambiguous_state(self) -> Option<usize> {
        if self.0.count_ones() == 1 {
            Some(self.0.trailing_zeros() as usize)
        } else {
            None
        }
    }
}

impl fmt::Debug for DiscreteCharacter {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "DiscreteCharacter({:#b})", self.0)
    }
}

/// The observed characters of every tip, indexed by tip node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CharacterMatrix {
    num_states: usize,
    num_sites: usize,
    tips: Vec<Option<Vec<DiscreteCharacter>>>,
}

impl CharacterMatrix {
    #[must_use]
    pub fn new(num_tips: usize, num_sites: usize, num_states: usize) -> Self {
        Self {
            num_states,
            num_sites,
            tips: vec![None; num_tips],
        }
    }

    #[must_use]
    pub const fn num_states(&self) -> usize {
        self.num_states
    }

    #[must_use]
    pub const fn num_sites(&self) -> usize {
        self.num_sites
    }

    #[must_use]
    pub fn num_tips(&self) -> usize {
        self.tips.len()
    }

    /// # Errors
    ///
    /// Returns `LikelihoodError` if `tip` is out of range, `characters` has
    /// the wrong number of sites, or a character is compatible with a state
    /// outside of the model.
    pub fn set_tip(
        &mut self,
        tip: usize,
        characters: Vec<DiscreteCharacter>,
    ) -> Result<(), LikelihoodError> {
        if characters.len() != self.num_sites {
            return Err(LikelihoodError::MalformedTipData {
                tip,
                expected: self.num_sites,
                found: characters.len(),
            });
        }

        let allowed = DiscreteCharacter::missing(self.num_states).mask();

        if let Some(character) = characters
            .iter()
            .find(|character| character.mask() & !allowed != 0)
        {
            return Err(LikelihoodError::StateOutOfRange {
                tip,
                state: 63 - character.mask().leading_zeros() as usize,
                num_states: self.num_states,
            });
        }

        let slot = self
            .tips
            .get_mut(tip)
            .ok_or(LikelihoodError::MissingTipData(tip))?;
        *slot = Some(characters);

        Ok(())
    }

    /// # Errors
    ///
    /// Returns `LikelihoodError` if `tip` is out of range or `symbols` has
    /// the wrong number of sites or contains an unknown symbol.
    pub fn set_tip_symbols(&mut self, tip: usize, symbols: &str) -> Result<(), LikelihoodError> {
        let characters: Option<Vec<DiscreteCharacter>> = symbols
            .chars()
            .map(|symbol| DiscreteCharacter::from_symbol(symbol, self.num_states))
            .collect();

        match characters {
            Some(characters) => self.set_tip(tip, characters),
            None => Err(LikelihoodError::MalformedTipData {
                tip,
                expected: self.num_sites,
                found: symbols.chars().count(),
            }),
        }
    }

    /// Sets the unambiguous states of `tip`.
    ///
    /// # Errors
    ///
    /// Returns `LikelihoodError` if `tip` is out of range, `states` has the
    /// wrong number of sites, or a state is out of range.
    pub fn set_tip_states(&mut self, tip: usize, states: &[usize]) -> Result<(), LikelihoodError> {
        let characters = states
            .iter()
            .map(|state| {
                DiscreteCharacter::state(*state, self.num_states).ok_or(
                    LikelihoodError::StateOutOfRange {
                        tip,
                        state: *state,
                        num_states: self.num_states,
                    },
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.set_tip(tip, characters)
    }

    #[must_use]
    pub fn tip(&self, tip: usize) -> Option<&[DiscreteCharacter]> {
        self.tips.get(tip).and_then(Option::as_deref)
    }
}

#[cfg(test)]
mod tests {
    use cladohist_core::error::LikelihoodError;

    use super::{CharacterMatrix, DiscreteCharacter};

    #[test]
    fn symbols_are_parsed_as_masks() {
        assert_eq!(DiscreteCharacter::from_symbol('2', 4), DiscreteCharacter::state(2, 4));
        assert_eq!(DiscreteCharacter::from_symbol('?', 3).map(DiscreteCharacter::mask), Some(0b111));
        assert_eq!(DiscreteCharacter::from_symbol('4', 4), None);

        let gap = DiscreteCharacter::missing(3);
        assert!(gap.is_ambiguous());
        assert!(gap.is_compatible(2));
        assert!(!gap.is_compatible(3));
        assert_eq!(gap.unambiguous_state(), None);
        assert_eq!(
            DiscreteCharacter::state(1, 2).and_then(DiscreteCharacter::unambiguous_state),
            Some(1)
        );
        assert_eq!(DiscreteCharacter::state(2, 2), None);
        assert_eq!(DiscreteCharacter::state(64, 100), None);
    }

    #[test]
    fn tips_are_validated() {
        let mut matrix = CharacterMatrix::new(2, 3, 2);

        matrix.set_tip_symbols(0, "01?").unwrap();
        assert_eq!(matrix.tip(0).map(<[_]>::len), Some(3));
        assert!(matrix.tip(1).is_none());

        assert_eq!(
            matrix.set_tip_symbols(1, "01"),
            Err(LikelihoodError::MalformedTipData {
                tip: 1,
                expected: 3,
                found: 2
            })
        );
        assert_eq!(
            matrix.set_tip_states(2, &[0, 0, 0]),
            Err(LikelihoodError::MissingTipData(2))
        );
        assert!(matrix.set_tip_symbols(1, "012").is_err());
    }

    #[test]
    fn out_of_range_states_are_rejected() {
        let mut matrix = CharacterMatrix::new(2, 2, 3);

        assert_eq!(
            matrix.set_tip_states(0, &[1, 3]),
            Err(LikelihoodError::StateOutOfRange {
                tip: 0,
                state: 3,
                num_states: 3
            })
        );
        assert_eq!(
            matrix.set_tip_states(0, &[0, 64]),
            Err(LikelihoodError::StateOutOfRange {
                tip: 0,
                state: 64,
                num_states: 3
            })
        );
        assert_eq!(
            matrix.set_tip(
                1,
                vec![
                    DiscreteCharacter::missing(3),
                    DiscreteCharacter::from_mask(0b1010)
                ]
            ),
            Err(LikelihoodError::StateOutOfRange {
                tip: 1,
                state: 3,
                num_states: 3
            })
        );
        assert!(matrix.tip(0).is_none());
        assert!(matrix.tip(1).is_none());

        matrix.set_tip_states(0, &[2, 0]).unwrap();
        assert_eq!(matrix.tip(0).map(<[_]>::len), Some(2));
    }
}
