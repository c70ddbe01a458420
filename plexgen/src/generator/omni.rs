use super::{GeneratorId, RateModel, ReactionGenerator};
use crate::family::SpeciesId;
use crate::feature::{ContextSpec, FeatureStimulus, OmniId};
use crate::mol::{ModificationName, MolParam, MolTypeId};
use crate::network::{Network, NetworkError, NetworkResult, ReactionKey};
use crate::plex::Plex;
use crate::util::log;
use error_stack::{bail, report};
use std::cell::OnceCell;

/// A species that takes part in every reaction of an omni rule, on top of the matched
/// species itself. Resolved on first use.
pub(crate) struct AuxSpecies {
    pub(crate) plex: Plex,
    pub(crate) params: Option<Vec<MolParam>>,
    resolved: OnceCell<SpeciesId>,
}

impl AuxSpecies {
    pub(crate) fn new(plex: Plex, params: Option<Vec<MolParam>>) -> Self {
        AuxSpecies {
            plex,
            params,
            resolved: OnceCell::new(),
        }
    }

    fn resolve(&self, network: &mut Network) -> NetworkResult<SpeciesId> {
        if let Some(id) = self.resolved.get() {
            return Ok(*id);
        }
        let params = self
            .params
            .clone()
            .unwrap_or_else(|| network.default_params(&self.plex));
        let id = network.intern_species(&self.plex, params)?;
        Ok(*self.resolved.get_or_init(|| id))
    }
}

/// Pattern-mol coordinates are resolved against the omni pattern when the rule is added.
pub(crate) struct StateChange {
    pub(crate) mol: usize,
    pub(crate) mod_site: usize,
    pub(crate) modification: ModificationName,
}

/// Rewrites the part of a complex matched by an omni-plex: changes modification states
/// and swaps molecule types, optionally consuming and producing auxiliary species.
pub struct OmniGenerator {
    pub(crate) omni: OmniId,
    pub(crate) state_queries: Vec<StateChange>,
    pub(crate) state_exchanges: Vec<StateChange>,
    pub(crate) type_exchanges: Vec<(usize, MolTypeId)>,
    pub(crate) aux_reactant: Option<AuxSpecies>,
    pub(crate) aux_product: Option<AuxSpecies>,
    pub(crate) rate: Box<dyn RateModel>,
}

impl ReactionGenerator for OmniGenerator {
    fn describe(&self) -> String {
        format!("omni rule on {:?}", self.omni)
    }

    fn respond(&self, network: &mut Network, me: GeneratorId, stimulus: &FeatureStimulus) -> NetworkResult<()> {
        let context = &stimulus.context;
        let ContextSpec::Omni(injection) = &context.spec else {
            bail!(NetworkError::Internal("omni rule context must carry an injection"));
        };
        let key = ReactionKey {
            generator: me,
            contexts: vec![context.clone()],
        };
        if network.reaction_for(&key).is_some() {
            return Ok(());
        }
        let image = |mol: usize| {
            injection
                .mol(mol)
                .ok_or(report!(NetworkError::Internal("omni injection misses a pattern mol")))
        };

        let species = network.species(context.species)?;
        let mut params = species.mol_params().to_vec();
        let mut plex = network.family(species.family())?.paradigm().clone();

        for query in &self.state_queries {
            let mol = image(query.mol)?;
            if params[mol].state().mods.get(query.mod_site) != Some(&query.modification) {
                log::trace!("{:?} fails a state query of {:?}", context.species, self.omni);
                return Ok(());
            }
        }
        for (mol, new_type) in &self.type_exchanges {
            let mol = image(*mol)?;
            plex.set_mol_type(mol, *new_type);
            params[mol] = network.catalog().default_param(*new_type);
        }
        for change in &self.state_exchanges {
            let mol = image(change.mol)?;
            params[mol] = params[mol].with_modification(change.mod_site, change.modification);
        }

        let product = network.intern_species(&plex, params)?;
        let mut reactants = vec![context.species];
        let mut products = vec![product];
        if let Some(aux) = &self.aux_reactant {
            reactants.push(aux.resolve(network)?);
        }
        let aux_product = match &self.aux_product {
            Some(aux) => Some(aux.resolve(network)?),
            None => None,
        };
        products.extend(aux_product);
        let recorded = network.record_reaction(key, &reactants, &products, self.rate.as_ref())?;
        if recorded.is_some() {
            network.expand_product(product, stimulus.depth)?;
            if let Some(aux) = aux_product {
                network.expand_product(aux, stimulus.depth)?;
            }
        }
        Ok(())
    }
}
