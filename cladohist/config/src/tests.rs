use log::LevelFilter;

use cladohist_core::cogs::{CharacterHistoryDistribution, Proposal, Tree};
use cladohist_core_maths::StdMathsCore;
use cladohist_impls::{
    cogs::rate_generator::AnyRateGenerator,
    process::HistoryProcess,
    proposal::{slide_time::SlideMode, AnyEventTimeProposal},
};

use crate::{
    args::{process::ProcessArguments, proposal::ProposalArguments, rng::RngArguments},
    build_chain,
    parse::{try_parse, try_print},
    ChainArguments,
};

type Process = HistoryProcess<StdMathsCore, AnyRateGenerator>;

const BIRTH_DEATH: &str = r"(
    rng: Seed(42),
    process: SampledSpeciation(
        root_age: 2.0,
        speciation: 1.5,
        extinction: 0.5,
        sampling_fraction: 0.5,
        taxa: 6,
    ),
    proposals: [
        EventTimeBeta(delta: 10.0),
        EventTimeSlide(delta: 0.2, mode: AcrossBranches),
    ],
)";

const CTMC: &str = r"(
    rng: Seed(7),
    process: Ctmc(
        rate_generator: JukesCantor(num_states: 4),
        clock_rate: 0.5,
        sites: 3,
        taxa: 5,
        root_age: 1.0,
    ),
    proposals: [EventTimeSlide(delta: 0.1)],
)";

#[test]
fn parses_defaults() {
    let args: ChainArguments = try_parse("chain", BIRTH_DEATH).unwrap();

    assert!(matches!(args.rng, RngArguments::Seed(42)));
    assert!(matches!(
        args.process,
        ProcessArguments::SampledSpeciation { taxa, .. } if taxa.get() == 6
    ));
    assert!(matches!(
        args.proposals.as_slice(),
        [
            ProposalArguments::EventTimeBeta { offset, .. },
            ProposalArguments::EventTimeSlide {
                mode: SlideMode::AcrossBranches,
                ..
            },
        ] if offset.get() == 0.0_f64
    ));

    let args: ChainArguments = try_parse(
        "chain",
        "(rng: Seed(1), process: SampledSpeciation(root_age: 1.0, speciation: 1.0, taxa: 2))",
    )
    .unwrap();

    assert!(args.proposals.is_empty());
    assert!(matches!(
        args.process,
        ProcessArguments::SampledSpeciation { extinction, sampling_fraction, .. }
            if extinction.get() == 0.0_f64 && sampling_fraction.get() == 1.0_f64
    ));
}

#[test]
fn parses_the_log_level() {
    let args: ChainArguments = try_parse(
        "chain",
        "(rng: Seed(1), process: SampledSpeciation(root_age: 1.0, speciation: 1.0, taxa: 2), \
         log_level: Debug)",
    )
    .unwrap();

    assert_eq!(args.log_level, Some(LevelFilter::Debug));

    let args: ChainArguments = try_parse("chain", BIRTH_DEATH).unwrap();
    assert_eq!(args.log_level, None);
}

#[test]
fn invalid_values_report_their_path() {
    let err = try_parse::<ChainArguments>(
        "chain",
        "(rng: Seed(1), process: SampledSpeciation(root_age: 1.0, speciation: 1.0, taxa: 2), \
         proposals: [EventTimeSlide(delta: -1.0)])",
    )
    .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("proposals"), "{message}");
    assert!(message.contains("delta"), "{message}");

    assert!(try_parse::<ChainArguments>(
        "chain",
        "(rng: Seed(1), process: SampledSpeciation(root_age: 1.0, speciation: 1.0, taxa: 0))",
    )
    .is_err());

    assert!(try_parse::<ChainArguments>(
        "chain",
        "(rng: Seed(1), seed: 4, process: SampledSpeciation(root_age: 1.0, speciation: 1.0, \
         taxa: 2))",
    )
    .is_err());
}

#[test]
fn builds_a_birth_death_chain() {
    let mut chain = build_chain(BIRTH_DEATH).unwrap();

    assert_eq!(chain.process.tree().num_tips(), 6);
    assert!(matches!(chain.process, HistoryProcess::SampledSpeciation(_)));
    assert_eq!(chain.proposals.len(), 2);

    let ln_probability = chain.process.compute_ln_probability().unwrap();
    assert!(!ln_probability.is_impossible());

    for proposal in &mut chain.proposals {
        Proposal::<StdMathsCore, Process>::prepare(proposal, &chain.process);
        Proposal::<StdMathsCore, Process>::do_proposal(
            proposal,
            &mut chain.process,
            &mut chain.rng,
        )
        .unwrap();
        Proposal::<StdMathsCore, Process>::undo_proposal(proposal, &mut chain.process).unwrap();
    }

    assert_eq!(
        chain.process.compute_ln_probability().unwrap(),
        ln_probability
    );
}

#[test]
fn builds_a_ctmc_chain() {
    let mut chain = build_chain(CTMC).unwrap();

    let HistoryProcess::Ctmc(process) = &chain.process else {
        panic!("expected a CTMC history process");
    };

    assert_eq!(process.character_history().num_sites(), 3);
    assert!(process.character_history().is_consistent());
    assert!(matches!(
        chain.proposals.as_slice(),
        [AnyEventTimeProposal::Slide(_)]
    ));

    assert!(!chain
        .process
        .compute_ln_probability()
        .unwrap()
        .is_impossible());
}

#[test]
fn prints_the_configuration() {
    let args: ChainArguments = try_parse("chain", BIRTH_DEATH).unwrap();

    let printed = try_print(&args).unwrap();

    assert!(printed.contains("Seed(42)"), "{printed}");
    assert!(printed.contains("EventTimeSlide"), "{printed}");
}
