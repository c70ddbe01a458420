//! The reaction network: the single context object through which species are born,
//! expanded and updated.

use crate::family::{
    CanonicalNameAssembler, FamilyId, NameAssembler, PlexFamily, Recognition, Recognizer, Species,
    SpeciesId,
};
use crate::feature::{Context, FeatureRegistry};
use crate::generator::{GeneratorId, RateModel, ReactionGenerator};
use crate::mol::{Catalog, MolParam};
use crate::plex::{ErrorKind, Plex, PlexError, PlexResult};
use crate::util::log;
use derive_more::From;
use error_stack::{ResultExt, bail, report};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use thiserror::Error;

mod config;
mod expand;
mod rules;
mod snapshot;

pub use config::NetworkConfig;
pub use rules::OmniRule;
pub use snapshot::{NetworkSnapshot, SpeciesSnapshot};

#[derive(Hash, Eq, PartialEq, derive_more::Debug, Clone, Copy, PartialOrd, Ord, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("R({_0})")]
pub struct ReactionId(pub u32);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("invalid complex or pattern")]
    Structural,
    #[error("internal consistency failure: {0}")]
    Internal(&'static str),
    #[error("unknown species {0:?}")]
    UnknownSpecies(SpeciesId),
    #[error("unknown family {0:?}")]
    UnknownFamily(FamilyId),
    #[error("unknown reaction {0:?}")]
    UnknownReaction(ReactionId),
    #[error("unknown omni-plex {0:?}")]
    UnknownOmni(crate::feature::OmniId),
    #[error("unknown mol type {0}")]
    UnknownMolType(String),
    #[error("mol type {mol_type} has no site {site}")]
    UnknownSite { mol_type: String, site: String },
    #[error("rules must be registered before the first species is created")]
    RulesSealed,
    #[error("expansion depth must be non-negative, got {0}")]
    NegativeDepth(i64),
    #[error("population of {species:?} would drop below zero ({population} {delta:+})")]
    NegativePopulation {
        species: SpeciesId,
        population: u64,
        delta: i64,
    },
    #[error("invalid rule: {0}")]
    InvalidRule(String),
}

impl NetworkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::Internal(_) => ErrorKind::Internal,
            _ => ErrorKind::StructuralInput,
        }
    }
}

pub type NetworkResult<T> = error_stack::Result<T, NetworkError>;

/// Lifts a structural result into the network layer, keeping internal failures internal.
pub(crate) trait IntoNetworkResult<T> {
    fn into_network(self) -> NetworkResult<T>;
}

impl<T> IntoNetworkResult<T> for PlexResult<T> {
    fn into_network(self) -> NetworkResult<T> {
        self.map_err(|report| {
            let context = match report.current_context().kind() {
                ErrorKind::Internal => NetworkError::Internal("structural algorithm failure"),
                ErrorKind::StructuralInput => NetworkError::Structural,
            };
            report.change_context(context)
        })
    }
}

/// A discovered reaction. Species appear with their multiplicity.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reaction {
    pub id: ReactionId,
    pub generator: GeneratorId,
    pub reactants: BTreeMap<SpeciesId, u32>,
    pub products: BTreeMap<SpeciesId, u32>,
    pub rate: f64,
}

/// Identifies the rule application that produced a reaction.
#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub struct ReactionKey {
    pub generator: GeneratorId,
    pub contexts: Vec<Context>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NetworkStats {
    pub notifications: u64,
    pub generator_invocations: u64,
    pub reactions: u64,
    pub null_reactions_skipped: u64,
}

pub struct Network {
    config: NetworkConfig,
    catalog: Catalog,
    recognizer: Recognizer,
    features: FeatureRegistry,
    generators: Vec<Rc<dyn ReactionGenerator>>,
    reactions: Vec<Reaction>,
    reaction_keys: HashMap<ReactionKey, ReactionId>,
    name_assembler: Box<dyn NameAssembler>,
    stats: NetworkStats,
}

impl Network {
    pub fn new(catalog: Catalog) -> Self {
        Self::with_config(catalog, NetworkConfig::default())
    }

    pub fn with_config(catalog: Catalog, config: NetworkConfig) -> Self {
        Network {
            recognizer: Recognizer::new(config.recognition_cache),
            config,
            catalog,
            features: FeatureRegistry::new(),
            generators: Vec::new(),
            reactions: Vec::new(),
            reaction_keys: HashMap::new(),
            name_assembler: Box::new(CanonicalNameAssembler),
            stats: NetworkStats::default(),
        }
    }

    pub fn set_name_assembler(&mut self, assembler: impl NameAssembler + 'static) {
        self.name_assembler = Box::new(assembler);
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn recognizer(&self) -> &Recognizer {
        &self.recognizer
    }

    pub fn features(&self) -> &FeatureRegistry {
        &self.features
    }

    pub fn stats(&self) -> NetworkStats {
        self.stats
    }

    pub fn species(&self, id: SpeciesId) -> NetworkResult<&Species> {
        self.recognizer
            .species(id)
            .ok_or(report!(NetworkError::UnknownSpecies(id)))
    }

    pub fn family(&self, id: FamilyId) -> NetworkResult<&PlexFamily> {
        self.recognizer
            .family(id)
            .ok_or(report!(NetworkError::UnknownFamily(id)))
    }

    pub fn family_of(&self, species: SpeciesId) -> NetworkResult<&PlexFamily> {
        let family = self.species(species)?.family();
        self.family(family)
    }

    pub fn reaction(&self, id: ReactionId) -> NetworkResult<&Reaction> {
        self.reactions
            .get(id.0 as usize)
            .ok_or(report!(NetworkError::UnknownReaction(id)))
    }

    pub fn reactions(&self) -> &[Reaction] {
        &self.reactions
    }

    pub fn reaction_for(&self, key: &ReactionKey) -> Option<ReactionId> {
        self.reaction_keys.get(key).copied()
    }

    pub fn species_count(&self) -> usize {
        self.recognizer.species_count()
    }

    pub fn family_count(&self) -> usize {
        self.recognizer.family_count()
    }

    /// The species' name, assembled on first request and cached.
    pub fn canonical_name(&self, id: SpeciesId) -> NetworkResult<&str> {
        let species = self.species(id)?;
        let family = self.family(species.family())?;
        let name = species.name.get_or_init(|| {
            self.name_assembler
                .assemble(&self.catalog, family, species.mol_params())
        });
        Ok(name.as_str())
    }

    /// Recognizes `plex`. A newly created family gets the feature occurrences of its
    /// paradigm.
    pub fn recognize(&mut self, plex: &Plex) -> NetworkResult<Recognition> {
        let features = &self.features;
        let catalog = &self.catalog;
        self.recognizer
            .recognize_with(catalog, plex, |paradigm| {
                features
                    .occurrences_in(catalog, paradigm)
                    .attach_printable_lazy(|| format!("connecting {paradigm:?} to features"))
            })
            .into_network()
    }

    /// Returns the species for `plex` in the given per-mol states, creating family and
    /// species as needed. `params` are aligned to the mols of `plex`, not to the paradigm.
    ///
    /// Does not expand the species.
    pub fn intern_species(&mut self, plex: &Plex, params: Vec<MolParam>) -> NetworkResult<SpeciesId> {
        if params.len() != plex.mol_count() {
            return Err(report!(PlexError::ParamCountMismatch {
                expected: plex.mol_count(),
                actual: params.len(),
            }))
            .into_network();
        }
        let recognition = self.recognize(plex)?;
        let aligned = recognition.iso.backward.pull_back(&params).ok_or(report!(
            NetworkError::Internal("recognition iso is not total")
        ))?;
        let (species, _) = self
            .recognizer
            .get_member(&self.catalog, recognition.family, aligned)
            .into_network()?;
        Ok(species)
    }

    /// Default per-mol states for `plex`.
    pub fn default_params(&self, plex: &Plex) -> Vec<MolParam> {
        plex.mols()
            .iter()
            .map(|m| self.catalog.default_param(*m))
            .collect()
    }

    /// Declares an explicit species and expands it to the configured default depth.
    pub fn add_species(&mut self, plex: &Plex, params: Option<Vec<MolParam>>) -> NetworkResult<SpeciesId> {
        let depth = self.config.default_depth;
        self.add_species_at_depth(plex, params, depth)
    }

    pub fn add_species_at_depth(
        &mut self,
        plex: &Plex,
        params: Option<Vec<MolParam>>,
        depth: u32,
    ) -> NetworkResult<SpeciesId> {
        plex.validate(&self.catalog).into_network()?;
        if !plex.is_connected() {
            return Err(report!(PlexError::NotConnected))
                .into_network()
                .attach_printable("species complexes must be connected");
        }
        let params = params.unwrap_or_else(|| self.default_params(plex));
        let species = self.intern_species(plex, params)?;
        log::info!("explicit species {species:?} at depth {depth}");
        self.ensure_expanded(species, depth)?;
        Ok(species)
    }

    /// Records a reaction unless one already exists for `key`.
    ///
    /// Returns `None` when the reaction was a duplicate or, if so configured, a null
    /// reaction. `rate` is consulted once, and only for a reaction that gets recorded.
    pub fn record_reaction(
        &mut self,
        key: ReactionKey,
        reactants: &[SpeciesId],
        products: &[SpeciesId],
        rate: &dyn RateModel,
    ) -> NetworkResult<Option<ReactionId>> {
        if self.reaction_keys.contains_key(&key) {
            return Ok(None);
        }
        let reactants = multiset(reactants);
        let products = multiset(products);
        for species in reactants.keys().chain(products.keys()) {
            self.species(*species)?;
        }
        if self.config.skip_null_reactions && reactants == products {
            self.stats.null_reactions_skipped += 1;
            log::warn!("skipping null reaction from {:?}", key.generator);
            return Ok(None);
        }

        let rate = rate.rate(self, &key.contexts);
        let id = ReactionId(self.reactions.len() as u32);
        for species in reactants.keys() {
            if let Some(s) = self.recognizer.species_mut(*species) {
                s.reactant_of.push(id);
            }
        }
        log::debug!("new reaction {id:?}: {reactants:?} -> {products:?} at rate {rate}");
        self.reactions.push(Reaction {
            id,
            generator: key.generator,
            reactants,
            products,
            rate,
        });
        self.reaction_keys.insert(key, id);
        self.stats.reactions += 1;
        Ok(Some(id))
    }

    pub(crate) fn generator(&self, id: GeneratorId) -> NetworkResult<Rc<dyn ReactionGenerator>> {
        self.generators
            .get(id.0 as usize)
            .cloned()
            .ok_or(report!(NetworkError::Internal("generator id was not issued by this network")))
    }

    pub(crate) fn ensure_rules_open(&self) -> NetworkResult<()> {
        if self.recognizer.family_count() > 0 {
            bail!(NetworkError::RulesSealed);
        }
        Ok(())
    }
}

fn multiset(species: &[SpeciesId]) -> BTreeMap<SpeciesId, u32> {
    let mut out = BTreeMap::new();
    for s in species {
        *out.entry(*s).or_insert(0) += 1;
    }
    out
}
