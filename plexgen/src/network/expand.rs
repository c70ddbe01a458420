//! The expansion protocol.
//!
//! A species is born unexpanded. The first request to expand it to some depth marks it
//! expanded and then notifies every feature its family displays: the species' context is
//! appended to the feature, and each generator on the feature gets a stimulus. Generators
//! expand the products they create one level shallower, so the recursion ends once the
//! depth reaches zero.
//!
//! The species is marked before notification starts, so a generator that runs into the
//! same species again (a self-reaction, say) finds it already expanded.

use super::{Network, NetworkError, NetworkResult, ReactionId};
use crate::family::{ExpansionState, SpeciesId};
use crate::feature::{Context, FeatureStimulus};
use crate::util::log;
use error_stack::{ResultExt, bail, report};

impl Network {
    /// Makes sure `species` has been expanded to at least `depth`.
    ///
    /// Asking again for the same or a smaller depth does nothing. Asking for a larger
    /// depth passes the extra depth on to the products of reactions the species already
    /// takes part in, without running any generator again.
    pub fn ensure_expanded(&mut self, species: SpeciesId, depth: u32) -> NetworkResult<()> {
        let state = self.species(species)?.expansion();
        match state {
            ExpansionState::Expanded(done) if done >= depth => Ok(()),
            ExpansionState::Expanded(done) => {
                log::debug!("deepening {species:?} from {done} to {depth}");
                self.set_expansion(species, depth)?;
                let Some(next) = depth.checked_sub(1) else {
                    return Ok(());
                };
                let reactions: Vec<ReactionId> = self.species(species)?.reactant_of().to_vec();
                for reaction in reactions {
                    let products: Vec<SpeciesId> =
                        self.reaction(reaction)?.products.keys().copied().collect();
                    for product in products {
                        self.ensure_expanded(product, next)?;
                    }
                }
                Ok(())
            }
            ExpansionState::Born => {
                self.set_expansion(species, depth)?;
                self.notify(species, depth)
            }
        }
    }

    /// Expands a freshly produced species one level below the stimulus that made it.
    pub fn expand_product(&mut self, product: SpeciesId, stimulus_depth: u32) -> NetworkResult<()> {
        match stimulus_depth.checked_sub(1) {
            Some(depth) => self.ensure_expanded(product, depth),
            None => Ok(()),
        }
    }

    fn set_expansion(&mut self, species: SpeciesId, depth: u32) -> NetworkResult<()> {
        let s = self
            .recognizer
            .species_mut(species)
            .ok_or(report!(NetworkError::UnknownSpecies(species)))?;
        s.expansion = ExpansionState::Expanded(depth);
        Ok(())
    }

    fn notify(&mut self, species: SpeciesId, depth: u32) -> NetworkResult<()> {
        self.stats.notifications += 1;
        let occurrences = self.family_of(species)?.features().to_vec();
        log::debug!(
            "notifying {} features of {species:?} at depth {depth}",
            occurrences.len()
        );
        for occurrence in occurrences {
            let context = Context {
                species,
                spec: occurrence.spec,
            };
            self.features.push_context(occurrence.feature, context.clone());
            let generators = self
                .features
                .get(occurrence.feature)
                .map(|f| f.generators().to_vec())
                .unwrap_or_default();
            let stimulus = FeatureStimulus {
                feature: occurrence.feature,
                context,
                depth,
            };
            for id in generators {
                let generator = self.generator(id)?;
                self.stats.generator_invocations += 1;
                generator
                    .respond(self, id, &stimulus)
                    .attach_printable_lazy(|| {
                        format!("{} responding to {:?}", generator.describe(), stimulus.context)
                    })?;
            }
        }
        Ok(())
    }

    /// Adds `delta` to the population of `species`, expanding it to `depth` first.
    ///
    /// Fails without changing anything if the population would drop below zero.
    pub fn update_population(&mut self, species: SpeciesId, delta: i64, depth: u32) -> NetworkResult<u64> {
        self.ensure_expanded(species, depth)?;
        let population = self.species(species)?.population();
        let updated = population as i128 + delta as i128;
        if updated < 0 {
            bail!(NetworkError::NegativePopulation {
                species,
                population,
                delta,
            });
        }
        let updated = u64::try_from(updated).unwrap_or(u64::MAX);
        if let Some(s) = self.recognizer.species_mut(species) {
            s.population = updated;
        }
        Ok(updated)
    }

    /// Applies one firing of `reaction`: consumes reactants and produces products, each
    /// species being expanded to `depth` on the way.
    pub fn fire_reaction(&mut self, reaction: ReactionId, depth: u32) -> NetworkResult<()> {
        let (reactants, products) = {
            let r = self.reaction(reaction)?;
            (r.reactants.clone(), r.products.clone())
        };
        for (species, count) in &reactants {
            let available = self.species(*species)?.population();
            if available < u64::from(*count) {
                return Err(report!(NetworkError::NegativePopulation {
                    species: *species,
                    population: available,
                    delta: -i64::from(*count),
                }))
                .attach_printable_lazy(|| format!("firing {reaction:?}"));
            }
        }
        for (species, count) in reactants {
            self.update_population(species, -i64::from(count), depth)?;
        }
        for (species, count) in products {
            self.update_population(species, i64::from(count), depth)?;
        }
        Ok(())
    }
}
