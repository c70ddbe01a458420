use super::{GeneratorId, RateModel, ReactionGenerator};
use crate::feature::{Context, ContextSpec, FeatureId, FeatureStimulus};
use crate::network::{Network, NetworkError, NetworkResult, ReactionKey};
use crate::plex::Binding;
use crate::util::log;
use error_stack::bail;

/// Joins two free sites on separate complexes into a new binding.
///
/// Subscribed to the free-site features of both sites. When a species displays one of
/// them, it is paired with every species that already displays the other.
pub struct DimerizationGenerator {
    left: FeatureId,
    right: FeatureId,
    rate: Box<dyn RateModel>,
}

impl DimerizationGenerator {
    pub fn new(left: FeatureId, right: FeatureId, rate: impl RateModel + 'static) -> Self {
        DimerizationGenerator {
            left,
            right,
            rate: Box::new(rate),
        }
    }

    fn make_reaction(
        &self,
        network: &mut Network,
        me: GeneratorId,
        left: &Context,
        right: &Context,
        depth: u32,
    ) -> NetworkResult<()> {
        let key = ReactionKey {
            generator: me,
            contexts: vec![left.clone(), right.clone()],
        };
        if network.reaction_for(&key).is_some() {
            return Ok(());
        }
        let (ContextSpec::FreeSite(left_site), ContextSpec::FreeSite(right_site)) =
            (&left.spec, &right.spec)
        else {
            bail!(NetworkError::Internal("dimerization contexts must be free sites"));
        };

        let left_species = network.species(left.species)?;
        let mut params = left_species.mol_params().to_vec();
        let left_paradigm = network.family(left_species.family())?.paradigm().clone();
        let right_species = network.species(right.species)?;
        params.extend_from_slice(right_species.mol_params());
        let right_paradigm = network.family(right_species.family())?.paradigm();

        let offset = left_paradigm.mol_count();
        let mut joined = left_paradigm.joined_with(right_paradigm);
        joined.push_binding(Binding::new(*left_site, right_site.offset(offset)));

        let product = network.intern_species(&joined, params)?;
        log::trace!("dimerizing {:?} and {:?} into {product:?}", left.species, right.species);
        let recorded = network.record_reaction(
            key,
            &[left.species, right.species],
            &[product],
            self.rate.as_ref(),
        )?;
        if recorded.is_some() {
            network.expand_product(product, depth)?;
        }
        Ok(())
    }
}

impl ReactionGenerator for DimerizationGenerator {
    fn describe(&self) -> String {
        format!("dimerization {:?} + {:?}", self.left, self.right)
    }

    fn respond(&self, network: &mut Network, me: GeneratorId, stimulus: &FeatureStimulus) -> NetworkResult<()> {
        // Partners are taken as they stand now. Species that turn up while this loop runs
        // get paired with the stimulus context when their own notification arrives.
        if stimulus.feature == self.left {
            let partners = network.features().contexts(self.right).to_vec();
            for partner in &partners {
                self.make_reaction(network, me, &stimulus.context, partner, stimulus.depth)?;
            }
        }
        if stimulus.feature == self.right && self.left != self.right {
            let partners = network.features().contexts(self.left).to_vec();
            for partner in &partners {
                self.make_reaction(network, me, partner, &stimulus.context, stimulus.depth)?;
            }
        }
        Ok(())
    }
}
