use super::{GeneratorId, RateModel, ReactionGenerator};
use crate::feature::{ContextSpec, FeatureId, FeatureStimulus};
use crate::network::{Network, NetworkError, NetworkResult, ReactionKey};
use crate::util::log;
use error_stack::{bail, report};

/// Breaks a binding, splitting the complex into one or two connected pieces.
pub struct DecompositionGenerator {
    feature: FeatureId,
    rate: Box<dyn RateModel>,
}

impl DecompositionGenerator {
    pub fn new(feature: FeatureId, rate: impl RateModel + 'static) -> Self {
        DecompositionGenerator {
            feature,
            rate: Box::new(rate),
        }
    }
}

impl ReactionGenerator for DecompositionGenerator {
    fn describe(&self) -> String {
        format!("decomposition of {:?}", self.feature)
    }

    fn respond(&self, network: &mut Network, me: GeneratorId, stimulus: &FeatureStimulus) -> NetworkResult<()> {
        let context = &stimulus.context;
        let ContextSpec::Binding(binding_idx) = context.spec else {
            bail!(NetworkError::Internal("decomposition context must be a binding"));
        };
        let key = ReactionKey {
            generator: me,
            contexts: vec![context.clone()],
        };
        if network.reaction_for(&key).is_some() {
            return Ok(());
        }

        let species = network.species(context.species)?;
        let params = species.mol_params().to_vec();
        let paradigm = network.family(species.family())?.paradigm().clone();
        if binding_idx >= paradigm.binding_count() {
            bail!(NetworkError::Internal("binding context out of range for paradigm"));
        }
        let broken = paradigm.binding(binding_idx);

        let mut pieces = vec![paradigm.tracked_component(broken.left.mol, Some(binding_idx))];
        if !pieces[0].covers(&paradigm) {
            pieces.push(paradigm.tracked_component(broken.right.mol, Some(binding_idx)));
        }

        let mut products = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            let piece_params = piece
                .embedding
                .pull_back(&params)
                .ok_or(report!(NetworkError::Internal("component embedding is not total")))?;
            products.push(network.intern_species(&piece.plex, piece_params)?);
        }
        log::trace!("splitting {:?} into {products:?}", context.species);
        let recorded =
            network.record_reaction(key, &[context.species], &products, self.rate.as_ref())?;
        if recorded.is_some() {
            for product in products {
                network.expand_product(product, stimulus.depth)?;
            }
        }
        Ok(())
    }
}
