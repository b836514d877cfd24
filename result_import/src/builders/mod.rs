//! Per-business-type import builders.
//!
//! A builder turns the ballots of one result section into a [`TallyDelta`]
//! for one political business in one counting circle. Builders never touch
//! stored results, so a whole batch can be validated before anything is
//! merged.

mod majority;
mod proportional;
mod vote;

use log::debug;
use snafu::{ensure, OptionExt};

pub use crate::builders::majority::{
    MajorityElectionImportBuilder, SecondaryMajorityElectionImportBuilder,
};
pub use crate::builders::proportional::ProportionalElectionImportBuilder;
pub use crate::builders::vote::VoteImportBuilder;

use crate::batch::{BusinessResultSection, SectionBallots};
use crate::domain::{PoliticalBusinessCatalog, PoliticalBusinessRef, PoliticalBusinessType};
use crate::error::*;
use crate::ids::*;
use crate::tally::TallyDelta;

/// The capability every business type provides to the orchestrators.
pub trait BallotImportBuilder {
    type Ballot;
    type Tally;

    fn business_id(&self) -> &PoliticalBusinessId;

    fn business_type(&self) -> PoliticalBusinessType;

    fn supports_invalid_votes(&self) -> bool;

    /// The zero-valued tally of this business.
    fn empty_tally(&self) -> Self::Tally;

    /// Adds one ballot. A ballot that fails validation leaves the tally untouched.
    fn process_ballot(&self, tally: &mut Self::Tally, ballot: &Self::Ballot) -> ImportResult<()>;

    /// Post-processing once every ballot has been added.
    fn finish(&self, _tally: &mut Self::Tally) {}
}

/// Runs a builder over all the ballots of a section.
pub fn build_tally<B: BallotImportBuilder>(
    builder: &B,
    ballots: &[B::Ballot],
) -> ImportResult<B::Tally> {
    let mut tally = builder.empty_tally();
    for ballot in ballots.iter() {
        builder.process_ballot(&mut tally, ballot)?;
    }
    builder.finish(&mut tally);
    Ok(tally)
}

/// A built section, ready to be merged into the result of its owner.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SectionTally {
    pub key: ResultKey,
    /// The type of the business owning the result.
    pub owner_type: PoliticalBusinessType,
    pub delta: TallyDelta,
}

/// Resolves the business of a section and returns the key of the result it
/// targets, without looking at the ballots.
pub fn resolve_section_target<'a>(
    catalog: &'a PoliticalBusinessCatalog,
    counting_circle: &CountingCircleId,
    section: &BusinessResultSection,
) -> ImportResult<(ResultKey, PoliticalBusinessRef<'a>)> {
    let business = catalog
        .resolve(&section.business_id)
        .context(UnknownPoliticalBusinessSnafu {
            business: section.business_id.clone(),
            counting_circle: counting_circle.clone(),
        })?;
    let declared_matches = matches!(
        (&section.ballots, business),
        (SectionBallots::Vote(_), PoliticalBusinessRef::Vote(_))
            | (SectionBallots::MajorityElection(_), PoliticalBusinessRef::MajorityElection(_))
            | (
                SectionBallots::MajorityElection(_),
                PoliticalBusinessRef::SecondaryMajorityElection(_, _)
            )
            | (
                SectionBallots::ProportionalElection(_),
                PoliticalBusinessRef::ProportionalElection(_)
            )
    );
    ensure!(
        declared_matches,
        BusinessTypeMismatchSnafu {
            business: section.business_id.clone(),
            counting_circle: counting_circle.clone(),
            declared: section.ballots.declared_type(),
            resolved: business.business_type(),
        }
    );
    let key = ResultKey::new(business.result_owner().clone(), counting_circle.clone());
    Ok((key, business))
}

/// Builds the tally of one section. This is the single dispatch point from a
/// resolved business type to its builder.
pub fn build_section_tally(
    catalog: &PoliticalBusinessCatalog,
    counting_circle: &CountingCircleId,
    section: &BusinessResultSection,
) -> ImportResult<SectionTally> {
    let (key, business) = resolve_section_target(catalog, counting_circle, section)?;
    let owner_type = match business {
        PoliticalBusinessRef::SecondaryMajorityElection(_, _) => {
            PoliticalBusinessType::MajorityElection
        }
        other => other.business_type(),
    };
    let delta = match (business, &section.ballots) {
        (PoliticalBusinessRef::Vote(vote), SectionBallots::Vote(ballots)) => {
            let builder = VoteImportBuilder::new(vote, counting_circle);
            TallyDelta::Vote(build_tally(&builder, ballots)?)
        }
        (
            PoliticalBusinessRef::MajorityElection(election),
            SectionBallots::MajorityElection(ballots),
        ) => {
            let builder = MajorityElectionImportBuilder::new(election, counting_circle);
            TallyDelta::MajorityElection(build_tally(&builder, ballots)?)
        }
        (
            PoliticalBusinessRef::SecondaryMajorityElection(secondary, primary),
            SectionBallots::MajorityElection(ballots),
        ) => {
            let builder =
                SecondaryMajorityElectionImportBuilder::new(secondary, primary, counting_circle);
            TallyDelta::SecondaryMajorityElection(
                secondary.id.clone(),
                build_tally(&builder, ballots)?,
            )
        }
        (
            PoliticalBusinessRef::ProportionalElection(election),
            SectionBallots::ProportionalElection(ballots),
        ) => {
            let builder = ProportionalElectionImportBuilder::new(election, counting_circle);
            TallyDelta::ProportionalElection(build_tally(&builder, ballots)?)
        }
        (business, ballots) => unreachable!(
            "build_section_tally: {:?} was resolved for {} ballots",
            business.business_type(),
            ballots.declared_type()
        ),
    };
    debug!(
        "build_section_tally: {} ({:?}): {} ballots -> {:?}",
        key,
        business.business_type(),
        section.ballots.len(),
        delta
    );
    Ok(SectionTally {
        key,
        owner_type,
        delta,
    })
}
