//! Rule registration. Every rule has to be in place before the first family is recognized,
//! since families compute the features they display exactly once.

use super::{IntoNetworkResult, Network, NetworkError, NetworkResult};
use crate::feature::{FeatureId, FeatureKey, OmniId, SiteKey, StructureQuery};
use crate::generator::omni::{AuxSpecies, StateChange};
use crate::generator::{
    DecompositionGenerator, DimerizationGenerator, GeneratorId, OmniGenerator, RateModel,
    ReactionGenerator,
};
use crate::mol::{ModificationName, MolParam, MolTypeId, MolTypeName, SiteName};
use crate::plex::{Plex, PlexError};
use crate::util::log;
use error_stack::{ResultExt, bail, report};
use std::rc::Rc;

/// Describes an omni generator in terms of the omni pattern's mols and the catalog's names.
/// Names are resolved by [`Network::add_omni_generator`].
#[derive(Debug, Clone)]
pub struct OmniRule {
    omni: OmniId,
    state_queries: Vec<(usize, SiteName, ModificationName)>,
    state_exchanges: Vec<(usize, SiteName, ModificationName)>,
    type_exchanges: Vec<(usize, MolTypeName)>,
    aux_reactant: Option<(Plex, Option<Vec<MolParam>>)>,
    aux_product: Option<(Plex, Option<Vec<MolParam>>)>,
}

impl OmniRule {
    pub fn new(omni: OmniId) -> Self {
        OmniRule {
            omni,
            state_queries: Vec::new(),
            state_exchanges: Vec::new(),
            type_exchanges: Vec::new(),
            aux_reactant: None,
            aux_product: None,
        }
    }

    /// Sets modification site `mod_site` of pattern mol `mol` to `modification`.
    pub fn exchange_state(
        mut self,
        mol: usize,
        mod_site: impl Into<SiteName>,
        modification: impl Into<ModificationName>,
    ) -> Self {
        self.state_exchanges
            .push((mol, mod_site.into(), modification.into()));
        self
    }

    /// Replaces pattern mol `mol` with a mol of type `mol_type` in its default state.
    /// Both types must have the same number of binding sites.
    pub fn exchange_type(mut self, mol: usize, mol_type: impl Into<MolTypeName>) -> Self {
        self.type_exchanges.push((mol, mol_type.into()));
        self
    }

    /// Only fires on species whose mol matched by `mol` carries `modification`.
    pub fn require_state(
        mut self,
        mol: usize,
        mod_site: impl Into<SiteName>,
        modification: impl Into<ModificationName>,
    ) -> Self {
        self.state_queries
            .push((mol, mod_site.into(), modification.into()));
        self
    }

    pub fn with_aux_reactant(mut self, plex: Plex, params: Option<Vec<MolParam>>) -> Self {
        self.aux_reactant = Some((plex, params));
        self
    }

    pub fn with_aux_product(mut self, plex: Plex, params: Option<Vec<MolParam>>) -> Self {
        self.aux_product = Some((plex, params));
        self
    }
}

impl Network {
    /// Returns the feature for `key`, creating it if needed.
    pub fn feature_for(&mut self, key: FeatureKey) -> NetworkResult<FeatureId> {
        self.ensure_rules_open()?;
        Ok(self.features.feature_for(key))
    }

    /// Resolves a binding site by names.
    pub fn site_key(&self, mol_type: &str, site: &str) -> NetworkResult<SiteKey> {
        let id = self
            .catalog
            .id_of(mol_type)
            .ok_or_else(|| report!(NetworkError::UnknownMolType(mol_type.to_string())))?;
        let site_idx = self
            .catalog
            .mol_type(id)
            .site_index(site)
            .ok_or_else(|| {
                report!(NetworkError::UnknownSite {
                    mol_type: mol_type.to_string(),
                    site: site.to_string(),
                })
            })?;
        Ok(SiteKey {
            mol_type: id,
            site: site_idx,
        })
    }

    /// Registers `generator` and subscribes it to every feature in `on`.
    pub fn register_generator(
        &mut self,
        generator: impl ReactionGenerator + 'static,
        on: &[FeatureId],
    ) -> NetworkResult<GeneratorId> {
        self.ensure_rules_open()?;
        if let Some(missing) = on.iter().find(|f| self.features.get(**f).is_none()) {
            bail!(NetworkError::InvalidRule(format!("unknown feature {missing:?}")));
        }
        let id = GeneratorId(self.generators.len() as u32);
        log::info!("registering {} as {id:?}", generator.describe());
        self.generators.push(Rc::new(generator));
        for feature in on {
            self.features.subscribe(*feature, id);
        }
        Ok(id)
    }

    /// Adds a rule joining a free `left` site to a free `right` site, each given as
    /// `(mol type, site)`.
    pub fn add_dimerization(
        &mut self,
        left: (&str, &str),
        right: (&str, &str),
        rate: impl RateModel + 'static,
    ) -> NetworkResult<GeneratorId> {
        let left_key = self.site_key(left.0, left.1)?;
        let right_key = self.site_key(right.0, right.1)?;
        let left_feature = self.feature_for(FeatureKey::FreeSite(left_key))?;
        let right_feature = self.feature_for(FeatureKey::FreeSite(right_key))?;
        let generator = DimerizationGenerator::new(left_feature, right_feature, rate);
        self.register_generator(generator, &[left_feature, right_feature])
    }

    /// Adds a rule breaking bindings between the two sites.
    pub fn add_decomposition(
        &mut self,
        left: (&str, &str),
        right: (&str, &str),
        rate: impl RateModel + 'static,
    ) -> NetworkResult<GeneratorId> {
        let left_key = self.site_key(left.0, left.1)?;
        let right_key = self.site_key(right.0, right.1)?;
        let feature = self.feature_for(FeatureKey::binding(left_key, right_key))?;
        self.register_generator(DecompositionGenerator::new(feature, rate), &[feature])
    }

    /// Registers a connected pattern whose first occurrence in a paradigm, if it satisfies
    /// `queries`, makes the family display a new omni feature.
    pub fn add_omni(&mut self, pattern: Plex, queries: Vec<StructureQuery>) -> NetworkResult<OmniId> {
        self.ensure_rules_open()?;
        pattern.validate(&self.catalog).into_network()?;
        if !pattern.is_connected() {
            return Err(report!(PlexError::NotConnected))
                .into_network()
                .attach_printable("omni patterns must be connected");
        }
        for query in &queries {
            let (site, want_free) = match query {
                StructureQuery::SiteFree(s) => (*s, true),
                StructureQuery::SiteBound(s) => (*s, false),
            };
            let in_range = site.mol < pattern.mol_count()
                && site.site < self.catalog.mol_type(pattern.mol_type(site.mol)).site_count();
            if !in_range {
                bail!(NetworkError::InvalidRule(format!(
                    "structure query on {site:?} is outside the pattern"
                )));
            }
            if want_free && !pattern.is_site_free(site) {
                bail!(NetworkError::InvalidRule(format!(
                    "{site:?} is bound in the pattern and can never be free"
                )));
            }
        }
        let id = self.features.add_omni(pattern, queries);
        log::info!("registering omni-plex {id:?}");
        Ok(id)
    }

    /// Resolves `rule` against its omni pattern and the catalog and registers the
    /// resulting generator on the omni's feature.
    pub fn add_omni_generator(
        &mut self,
        rule: OmniRule,
        rate: impl RateModel + 'static,
    ) -> NetworkResult<GeneratorId> {
        self.ensure_rules_open()?;
        let omni = self
            .features
            .omni(rule.omni)
            .ok_or(report!(NetworkError::UnknownOmni(rule.omni)))?;
        let pattern = &omni.pattern;
        let feature = omni.feature;

        let check_mol = |mol: usize| {
            if mol < pattern.mol_count() {
                Ok(mol)
            } else {
                Err(report!(NetworkError::InvalidRule(format!(
                    "pattern has no mol {mol}"
                ))))
            }
        };

        let mut effective: Vec<MolTypeId> = pattern.mols().to_vec();
        let mut type_exchanges = Vec::new();
        for (mol, name) in &rule.type_exchanges {
            let mol = check_mol(*mol)?;
            let new_type = self
                .catalog
                .id_of(name)
                .ok_or_else(|| report!(NetworkError::UnknownMolType(name.to_string())))?;
            let old_sites = self.catalog.mol_type(pattern.mol_type(mol)).site_count();
            if self.catalog.mol_type(new_type).site_count() != old_sites {
                bail!(NetworkError::InvalidRule(format!(
                    "cannot exchange mol {mol} for {name}: binding site counts differ"
                )));
            }
            effective[mol] = new_type;
            type_exchanges.push((mol, new_type));
        }

        let resolve = |mol: usize,
                       mol_type: MolTypeId,
                       site: &SiteName,
                       modification: &ModificationName|
         -> NetworkResult<StateChange> {
            let mod_site = self
                .catalog
                .mol_type(mol_type)
                .mod_site_index(site)
                .ok_or_else(|| {
                    report!(NetworkError::InvalidRule(format!(
                        "mol {mol} has no modification site {site}"
                    )))
                })?;
            if self.catalog.modification(modification).is_none() {
                bail!(NetworkError::InvalidRule(format!(
                    "unknown modification {modification}"
                )));
            }
            Ok(StateChange {
                mol,
                mod_site,
                modification: *modification,
            })
        };

        let mut state_queries = Vec::new();
        for (mol, site, modification) in &rule.state_queries {
            let mol = check_mol(*mol)?;
            state_queries.push(resolve(mol, pattern.mol_type(mol), site, modification)?);
        }
        let mut state_exchanges = Vec::new();
        for (mol, site, modification) in &rule.state_exchanges {
            let mol = check_mol(*mol)?;
            state_exchanges.push(resolve(mol, effective[mol], site, modification)?);
        }

        let aux_reactant = rule
            .aux_reactant
            .map(|(plex, params)| self.check_aux(plex, params))
            .transpose()?;
        let aux_product = rule
            .aux_product
            .map(|(plex, params)| self.check_aux(plex, params))
            .transpose()?;

        let generator = OmniGenerator {
            omni: rule.omni,
            state_queries,
            state_exchanges,
            type_exchanges,
            aux_reactant,
            aux_product,
            rate: Box::new(rate),
        };
        self.register_generator(generator, &[feature])
    }

    fn check_aux(&self, plex: Plex, params: Option<Vec<MolParam>>) -> NetworkResult<AuxSpecies> {
        plex.validate(&self.catalog)
            .into_network()
            .attach_printable("auxiliary species")?;
        if !plex.is_connected() {
            return Err(report!(PlexError::NotConnected))
                .into_network()
                .attach_printable("auxiliary species must be connected");
        }
        if let Some(params) = &params {
            if params.len() != plex.mol_count() {
                return Err(report!(PlexError::ParamCountMismatch {
                    expected: plex.mol_count(),
                    actual: params.len(),
                }))
                .into_network();
            }
        }
        Ok(AuxSpecies::new(plex, params))
    }
}
