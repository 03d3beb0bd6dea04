use cladohist_core::{
    cogs::{RateGenerator, SeedableRng, Tree},
    error::LikelihoodError,
    event_map::{CladogenesisModel, CladogeneticEventMap, Split},
    history::CharacterHistory,
    probability::LnProbability,
};
use cladohist_core_bond::{ClosedUnitF64, NonNegativeF64, OpenUnitF64, PositiveF64};
use cladohist_core_maths::StdMathsCore;

use crate::{
    cogs::{rate_generator::jukes_cantor::JukesCantor, rng::wyhash::WyHash},
    data::{CharacterMatrix, SitePatterns},
    tree::TimeTree,
};

use super::{SiteRates, TreeLikelihood};

fn patterns(num_states: usize, tips: &[&str]) -> SitePatterns {
    let num_sites = tips[0].len();
    let mut matrix = CharacterMatrix::new(tips.len(), num_sites, num_states);

    for (tip, symbols) in tips.iter().enumerate() {
        matrix.set_tip_symbols(tip, symbols).unwrap();
    }

    SitePatterns::compress(&matrix, tips.len()).unwrap()
}

fn cherry(tip_age: f64, root_age: f64) -> TimeTree {
    TimeTree::from_parents(&[Some(2), Some(2), None], &[tip_age, tip_age, root_age]).unwrap()
}

fn engine(num_states: usize, tips: &[&str]) -> TreeLikelihood<StdMathsCore, JukesCantor> {
    TreeLikelihood::new(
        JukesCantor::new(num_states).unwrap(),
        PositiveF64::new(1.0_f64).unwrap(),
        patterns(num_states, tips),
    )
}

fn p(value: f64) -> ClosedUnitF64 {
    ClosedUnitF64::new(value).unwrap()
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-10_f64, "{a} != {b}");
}

#[test]
fn zero_length_two_taxon_tree_has_uniform_site_likelihoods() {
    let tree = cherry(0.0_f64, 0.0_f64);
    let mut likelihood = engine(4, &["0123", "0123"]);

    let ln_likelihood = likelihood.compute_ln_probability(&tree, None).unwrap();

    assert_close(ln_likelihood.get(), 4.0_f64 * 0.25_f64.ln());
}

#[test]
fn incompatible_tips_on_zero_length_branches_are_impossible() {
    let tree = cherry(0.0_f64, 0.0_f64);
    let mut likelihood = engine(2, &["01", "00"]);

    assert_eq!(
        likelihood.compute_ln_probability(&tree, None),
        Ok(LnProbability::Impossible)
    );
}

#[test]
fn pruning_matches_enumeration() {
    let tree = TimeTree::from_parents(
        &[Some(3), Some(3), Some(4), Some(4), None],
        &[0.0_f64, 0.0_f64, 0.0_f64, 0.4_f64, 1.1_f64],
    )
    .unwrap();
    let jc = JukesCantor::new(3).unwrap();
    let mut likelihood = engine(3, &["0", "1", "?"]);

    let p_03 = jc.calculate_transition_probabilities::<StdMathsCore>(0.4_f64, 0.0_f64, 1.0_f64);
    let p_43 = jc.calculate_transition_probabilities::<StdMathsCore>(1.1_f64, 0.4_f64, 1.0_f64);

    // The missing tip sums to one over all states
    let mut expected = 0.0_f64;
    for root in 0..3 {
        for inner in 0..3 {
            expected += (1.0_f64 / 3.0_f64) * p_43[(root, inner)] * p_03[(inner, 0)] * p_03[(inner, 1)];
        }
    }

    let ln_likelihood = likelihood.compute_ln_probability(&tree, None).unwrap();

    assert_close(ln_likelihood.get(), expected.ln());
}

#[test]
fn invariant_sites_mix_into_the_site_likelihood() {
    let tree = cherry(0.0_f64, 0.5_f64);
    let jc = JukesCantor::new(2).unwrap();

    let variable: f64 = {
        let p = jc.calculate_transition_probabilities::<StdMathsCore>(0.5_f64, 0.0_f64, 1.0_f64);
        0.5_f64 * (p[(0, 0)] * p[(0, 0)] + p[(1, 0)] * p[(1, 0)])
    };

    let mut likelihood = engine(2, &["0", "0"]).with_invariant_sites(p(0.25_f64));
    let ln_likelihood = likelihood.compute_ln_probability(&tree, None).unwrap();

    assert_close(
        ln_likelihood.get(),
        (0.75_f64 * variable + 0.25_f64 * 0.5_f64).ln(),
    );
}

#[test]
fn rate_categories_are_averaged() {
    let tree = cherry(0.0_f64, 0.5_f64);

    let mut slow_fast = engine(2, &["01", "00"]).with_site_rates(
        SiteRates::new(&[
            (NonNegativeF64::new(0.0_f64).unwrap(), p(0.5_f64)),
            (NonNegativeF64::new(2.0_f64).unwrap(), p(0.5_f64)),
        ])
        .unwrap(),
    );
    let mut fast = engine(2, &["01", "00"]).with_site_rates(
        SiteRates::new(&[(NonNegativeF64::new(2.0_f64).unwrap(), p(1.0_f64))]).unwrap(),
    );

    let jc = JukesCantor::new(2).unwrap();
    let p_fast = jc.calculate_transition_probabilities::<StdMathsCore>(0.5_f64, 0.0_f64, 2.0_f64);

    // Site 0 is constant and site 1 differs, which the rate zero category
    // cannot explain.
    let constant =
        0.25_f64 + 0.25_f64 * (p_fast[(0, 0)].powi(2) + p_fast[(1, 0)].powi(2));
    let differing = 0.5_f64 * p_fast[(0, 0)] * p_fast[(0, 1)];

    assert_close(
        slow_fast.compute_ln_probability(&tree, None).unwrap().get(),
        constant.ln() + differing.ln(),
    );
    assert!(fast.compute_ln_probability(&tree, None).unwrap().get().is_finite());
}

#[test]
fn identity_splits_match_the_anagenetic_model() {
    let tree = TimeTree::from_parents(
        &[Some(3), Some(3), Some(4), Some(4), None],
        &[0.0_f64, 0.0_f64, 0.0_f64, 0.3_f64, 0.9_f64],
    )
    .unwrap();

    let mut anagenetic = engine(2, &["0011", "0101", "0110"]);
    let mut cladogenetic = engine(2, &["0011", "0101", "0110"]).with_cladogenesis(
        CladogenesisModel::Homogeneous(CladogeneticEventMap::identity(2)),
    );

    assert_close(
        anagenetic.compute_ln_probability(&tree, None).unwrap().get(),
        cladogenetic.compute_ln_probability(&tree, None).unwrap().get(),
    );
}

#[test]
fn cladogenetic_nodes_must_bifurcate() {
    let tree = TimeTree::from_parents(
        &[Some(3), Some(3), Some(3), None],
        &[0.0_f64, 0.0_f64, 0.0_f64, 1.0_f64],
    )
    .unwrap();

    let mut likelihood = engine(2, &["0", "1", "0"]).with_cladogenesis(
        CladogenesisModel::Homogeneous(CladogeneticEventMap::identity(2)),
    );

    assert_eq!(
        likelihood.compute_ln_probability(&tree, None),
        Err(LikelihoodError::NonBifurcating {
            node: 3,
            children: 3
        })
    );
}

#[test]
fn branch_events_need_an_event_map() {
    let tree = cherry(0.0_f64, 1.0_f64);
    let mut history = CharacterHistory::new(&tree, 1, 2, false);
    history
        .new_event(0, 0, 1, OpenUnitF64::new(0.5_f64).unwrap())
        .unwrap();

    let mut likelihood = engine(2, &["0", "1"]).with_cladogenesis(CladogenesisModel::Homogeneous(
        CladogeneticEventMap::empty(2),
    ));

    assert_eq!(
        likelihood.compute_ln_probability(&tree, Some(&history)),
        Err(LikelihoodError::EmptyEventMap(0))
    );
}

fn asymmetric_split_map() -> CladogeneticEventMap {
    CladogeneticEventMap::new(
        2,
        [
            (Split::new(0, 0, 1), p(0.5_f64)),
            (Split::new(0, 1, 0), p(0.5_f64)),
            (Split::new(1, 1, 1), p(1.0_f64)),
        ],
    )
    .unwrap()
}

#[test]
fn cladogenetic_root_combines_daughter_states() {
    let tree = cherry(0.0_f64, 0.0_f64);

    let mut likelihood = engine(2, &["0", "1"])
        .with_cladogenesis(CladogenesisModel::Homogeneous(asymmetric_split_map()));

    assert_close(
        likelihood.compute_ln_probability(&tree, None).unwrap().get(),
        0.25_f64.ln(),
    );
}

#[test]
fn marginals_sum_to_the_site_likelihood_at_every_node() {
    let tree = TimeTree::from_parents(
        &[Some(3), Some(3), Some(4), Some(4), None],
        &[0.0_f64, 0.0_f64, 0.0_f64, 0.2_f64, 0.7_f64],
    )
    .unwrap();

    for cladogenesis in [None, Some(asymmetric_split_map())] {
        let mut likelihood = engine(2, &["01", "00", "1?"]);
        if let Some(map) = cladogenesis {
            likelihood = likelihood.with_cladogenesis(CladogenesisModel::Homogeneous(map));
        }

        assert_eq!(
            likelihood.compute_marginal_likelihoods(&tree),
            Err(LikelihoodError::PartialsNotComputed)
        );

        likelihood.compute_ln_probability(&tree, None).unwrap();
        likelihood.compute_marginal_likelihoods(&tree).unwrap();

        let frequencies = likelihood.root_frequencies();
        let root_partials = likelihood.node_partials(tree.root()).unwrap();

        for pattern in 0..likelihood.patterns().num_patterns() {
            let site_likelihood: f64 = (0..2)
                .map(|state| root_partials[pattern * 2 + state] * frequencies[state])
                .sum();

            for node in 0..tree.num_nodes() {
                let marginal = likelihood.marginal_likelihoods(node).unwrap();

                assert_close(marginal[pattern * 2] + marginal[pattern * 2 + 1], site_likelihood);
            }
        }
    }
}

#[test]
fn ancestral_states_follow_unambiguous_data() {
    let tree = cherry(0.0_f64, 0.0_f64);
    let mut rng = WyHash::seed_from_u64(5);

    let mut likelihood = engine(2, &["010", "010"]);
    likelihood.compute_ln_probability(&tree, None).unwrap();
    likelihood.compute_marginal_likelihoods(&tree).unwrap();

    for _ in 0..16 {
        let marginal = likelihood.draw_marginal_states(&tree, &mut rng).unwrap();
        assert_eq!(marginal[2], vec![0, 1, 0]);

        let joint = likelihood.draw_joint_conditional_states(&tree, &mut rng).unwrap();
        for node in 0..3 {
            assert_eq!(joint.end_states(node), &[0, 1, 0]);
        }
        assert_eq!(joint.start_states(0), &[0, 1, 0]);
    }
}

#[test]
fn joint_draws_sample_cladogenetic_splits() {
    let tree = cherry(0.0_f64, 0.0_f64);
    let mut rng = WyHash::seed_from_u64(8);

    let mut likelihood = engine(2, &["0", "1"])
        .with_cladogenesis(CladogenesisModel::Homogeneous(asymmetric_split_map()));
    likelihood.compute_ln_probability(&tree, None).unwrap();

    for _ in 0..16 {
        let joint = likelihood.draw_joint_conditional_states(&tree, &mut rng).unwrap();

        assert_eq!(joint.end_states(2), &[0]);
        assert_eq!(joint.start_states(0), &[0]);
        assert_eq!(joint.start_states(1), &[1]);
        assert_eq!(joint.end_states(0), &[0]);
        assert_eq!(joint.end_states(1), &[1]);
    }
}

#[test]
fn marginal_draws_require_marginals() {
    let tree = cherry(0.0_f64, 1.0_f64);
    let mut rng = WyHash::seed_from_u64(1);
    let likelihood = engine(2, &["0", "1"]);

    assert_eq!(
        likelihood.draw_marginal_states(&tree, &mut rng),
        Err(LikelihoodError::PartialsNotComputed)
    );
    assert!(likelihood
        .draw_joint_conditional_states(&tree, &mut rng)
        .is_err());
}

#[test]
fn cladogenetic_root_draws_weigh_in_the_root_partials() {
    let tree = cherry(0.0_f64, 0.5_f64);
    let mut rng = WyHash::seed_from_u64(34);

    let mut likelihood = engine(2, &["0", "0"]).with_cladogenesis(CladogenesisModel::Homogeneous(
        CladogeneticEventMap::identity(2),
    ));
    likelihood.compute_ln_probability(&tree, None).unwrap();

    let transitions = JukesCantor::new(2)
        .unwrap()
        .calculate_transition_probabilities::<StdMathsCore>(0.5_f64, 0.0_f64, 1.0_f64);

    // Both the root partial and the daughter branches contribute P(a -> 0)^2
    let same = transitions[(0, 0)].powi(4);
    let different = transitions[(1, 0)].powi(4);
    let expected = same / (same + different);

    let draws = 20_000_u32;
    let mut zeros = 0_u32;

    for _ in 0..draws {
        let joint = likelihood.draw_joint_conditional_states(&tree, &mut rng).unwrap();

        assert_eq!(joint.start_states(0), joint.end_states(2));
        assert_eq!(joint.start_states(1), joint.end_states(2));

        if joint.end_states(2) == [0] {
            zeros += 1;
        }
    }

    let empirical = f64::from(zeros) / f64::from(draws);

    assert!(
        (empirical - expected).abs() < 0.01_f64,
        "{empirical} != {expected}"
    );
}

#[test]
fn zero_marginals_fall_back_to_uniform_states() {
    let tree = cherry(0.0_f64, 0.0_f64);
    let mut rng = WyHash::seed_from_u64(55);

    let mut likelihood = engine(2, &["0", "1"]);
    assert_eq!(
        likelihood.compute_ln_probability(&tree, None),
        Ok(LnProbability::Impossible)
    );
    likelihood.compute_marginal_likelihoods(&tree).unwrap();

    for node in 0..tree.num_nodes() {
        assert!(likelihood
            .marginal_likelihoods(node)
            .unwrap()
            .iter()
            .all(|marginal| *marginal == 0.0_f64));
    }

    let mut seen = [[false; 2]; 3];

    for _ in 0..64 {
        let states = likelihood.draw_marginal_states(&tree, &mut rng).unwrap();

        for (node, node_states) in states.iter().enumerate() {
            seen[node][node_states[0]] = true;
        }
    }

    assert_eq!(seen, [[true; 2]; 3]);
}
