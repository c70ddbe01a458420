//! Reaction generators: rule-specific procedures that turn feature stimuli into
//! reactions and product species.

use crate::feature::{Context, FeatureStimulus};
use crate::network::{Network, NetworkResult};
use derive_more::From;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod decompose;
pub mod dimerize;
pub mod omni;

pub use decompose::DecompositionGenerator;
pub use dimerize::DimerizationGenerator;
pub use omni::OmniGenerator;

#[derive(Hash, Eq, PartialEq, derive_more::Debug, Clone, Copy, PartialOrd, Ord, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("G({_0})")]
pub struct GeneratorId(pub u32);

/// Reacts to species newly displaying a feature the generator is subscribed to.
///
/// `me` is the id the network registered this generator under; it keys the reactions
/// the generator records.
pub trait ReactionGenerator {
    fn describe(&self) -> String;

    fn respond(&self, network: &mut Network, me: GeneratorId, stimulus: &FeatureStimulus) -> NetworkResult<()>;
}

/// Supplies the rate of a newly constructed reaction from its triggering contexts.
pub trait RateModel {
    fn rate(&self, network: &Network, contexts: &[Context]) -> f64;
}

impl<F> RateModel for F
where
    F: Fn(&Network, &[Context]) -> f64,
{
    fn rate(&self, network: &Network, contexts: &[Context]) -> f64 {
        self(network, contexts)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantRate(pub f64);

impl RateModel for ConstantRate {
    fn rate(&self, _network: &Network, _contexts: &[Context]) -> f64 {
        self.0
    }
}
