use cladohist_core::{
    cogs::{MathsCore, RateGenerator},
    error::LikelihoodError,
    event_map::CladogeneticEventMap,
    history::BranchHistory,
    matrix::TransitionMatrix,
};

/// Builds the matrix of an instantaneous cladogenetic event, in which either
/// daughter lineage can be the one that continues along the branch.
///
/// Ancestor states without any split in the map keep their state.
#[must_use]
pub fn cladogenetic_matrix(event_map: &CladogeneticEventMap) -> TransitionMatrix {
    let num_states = event_map.num_states();

    let mut matrix = TransitionMatrix::zeros(num_states);
    let mut has_splits = vec![false; num_states];

    for (split, probability) in event_map.iter() {
        matrix[(split.ancestor, split.left)] += 0.5_f64 * probability;
        matrix[(split.ancestor, split.right)] += 0.5_f64 * probability;

        has_splits[split.ancestor] = true;
    }

    for (state, has_splits) in has_splits.into_iter().enumerate() {
        if !has_splits {
            matrix[(state, state)] = 1.0_f64;
        }
    }

    matrix
}

/// Composes the transition matrix of a branch from `start_age` down to
/// `end_age`, interleaving anagenetic evolution with the cladogenetic events
/// recorded on the branch.
///
/// # Errors
///
/// Returns `LikelihoodError::EmptyEventMap` if the branch has events but the
/// event map is empty, and `LikelihoodError::DimensionMismatch` if the map
/// and rate generator disagree on the number of states.
pub fn compose<M: MathsCore, R: RateGenerator>(
    branch: &BranchHistory,
    rate_generator: &R,
    clock_rate: f64,
    start_age: f64,
    end_age: f64,
    event_map: &CladogeneticEventMap,
) -> Result<TransitionMatrix, LikelihoodError> {
    if !branch.has_events() {
        return Ok(rate_generator.calculate_transition_probabilities::<M>(
            start_age, end_age, clock_rate,
        ));
    }

    if event_map.is_empty() {
        return Err(LikelihoodError::EmptyEventMap(branch.branch_index()));
    }

    if event_map.num_states() != rate_generator.num_states() {
        return Err(LikelihoodError::DimensionMismatch {
            what: "cladogenetic event map",
            expected: rate_generator.num_states(),
            found: event_map.num_states(),
        });
    }

    let cladogenesis = cladogenetic_matrix(event_map);
    let branch_length = start_age - end_age;

    let mut composed = TransitionMatrix::identity(rate_generator.num_states());
    let mut boundary_age = start_age;

    for event in branch.events() {
        let event_age = start_age - event.time().get() * branch_length;

        composed *= &rate_generator.calculate_transition_probabilities::<M>(
            boundary_age,
            event_age,
            clock_rate,
        );
        composed *= &cladogenesis;

        boundary_age = event_age;
    }

    composed *=
        &rate_generator.calculate_transition_probabilities::<M>(boundary_age, end_age, clock_rate);

    Ok(composed)
}
