//! Structural features that reaction generators subscribe to, and the contexts in which
//! species display them.

use crate::family::SpeciesId;
use crate::generator::GeneratorId;
use crate::mol::{Catalog, MolTypeId};
use crate::plex::{IsoSearch, Plex, PlexMap, PlexResult, SiteSpec};
use crate::util::log;
use derive_more::From;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Hash, Eq, PartialEq, derive_more::Debug, Clone, Copy, PartialOrd, Ord, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("Feat({_0})")]
pub struct FeatureId(pub u32);

#[derive(Hash, Eq, PartialEq, derive_more::Debug, Clone, Copy, PartialOrd, Ord, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("Omni({_0})")]
pub struct OmniId(pub u32);

/// A binding site of a molecule type, independent of any complex.
#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SiteKey {
    pub mol_type: MolTypeId,
    pub site: usize,
}

#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FeatureKey {
    /// A free occurrence of the site.
    FreeSite(SiteKey),
    /// A binding between the two sites, smaller key first.
    Binding(SiteKey, SiteKey),
    Omni(OmniId),
}

impl FeatureKey {
    pub fn binding(a: SiteKey, b: SiteKey) -> Self {
        if a <= b {
            FeatureKey::Binding(a, b)
        } else {
            FeatureKey::Binding(b, a)
        }
    }
}

/// Where in a family's paradigm a feature is displayed.
#[derive(Hash, Eq, PartialEq, Debug, Clone, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ContextSpec {
    FreeSite(SiteSpec),
    /// Index of the binding in the paradigm.
    Binding(usize),
    /// Injection of the omni pattern into the paradigm.
    Omni(PlexMap),
}

/// A species together with the place in its paradigm that matched a feature.
#[derive(Hash, Eq, PartialEq, Debug, Clone, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Context {
    pub species: SpeciesId,
    pub spec: ContextSpec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureOccurrence {
    pub feature: FeatureId,
    pub spec: ContextSpec,
}

/// Delivered to every generator on a feature when a species first displays it.
#[derive(Debug, Clone)]
pub struct FeatureStimulus {
    pub feature: FeatureId,
    pub context: Context,
    pub depth: u32,
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub key: FeatureKey,
    contexts: Vec<Context>,
    generators: Vec<GeneratorId>,
}

impl Feature {
    pub fn contexts(&self) -> &[Context] {
        &self.contexts
    }

    pub fn generators(&self) -> &[GeneratorId] {
        &self.generators
    }
}

#[derive(Hash, Eq, PartialEq, Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StructureQuery {
    SiteFree(SiteSpec),
    SiteBound(SiteSpec),
}

/// A distinguished connected sub-pattern, optionally constrained by which of its
/// sites must be free or bound in the host complex.
#[derive(Debug, Clone)]
pub struct OmniPlex {
    pub id: OmniId,
    pub pattern: Plex,
    pub queries: Vec<StructureQuery>,
    pub feature: FeatureId,
}

impl OmniPlex {
    /// Whether the host complex satisfies every structure query under `injection`.
    pub fn satisfied_by(&self, host: &Plex, injection: &PlexMap) -> bool {
        self.queries.iter().all(|q| {
            let (site, want_free) = match q {
                StructureQuery::SiteFree(s) => (*s, true),
                StructureQuery::SiteBound(s) => (*s, false),
            };
            injection
                .site(site)
                .is_some_and(|image| host.is_site_free(image) == want_free)
        })
    }
}

/// All features and omni-plexes known to a network.
#[derive(Debug, Default)]
pub struct FeatureRegistry {
    features: Vec<Feature>,
    by_key: HashMap<FeatureKey, FeatureId>,
    omnis: Vec<OmniPlex>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the feature for `key`, creating it on first use.
    pub fn feature_for(&mut self, key: FeatureKey) -> FeatureId {
        if let Some(id) = self.by_key.get(&key) {
            return *id;
        }
        let id = FeatureId(self.features.len() as u32);
        self.features.push(Feature {
            key,
            contexts: Vec::new(),
            generators: Vec::new(),
        });
        self.by_key.insert(key, id);
        log::debug!("registered feature {id:?} for {key:?}");
        id
    }

    pub fn lookup(&self, key: &FeatureKey) -> Option<FeatureId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contexts(&self, id: FeatureId) -> &[Context] {
        self.get(id).map(Feature::contexts).unwrap_or_default()
    }

    pub(crate) fn subscribe(&mut self, id: FeatureId, generator: GeneratorId) {
        if let Some(feature) = self.features.get_mut(id.0 as usize) {
            if !feature.generators.contains(&generator) {
                feature.generators.push(generator);
            }
        }
    }

    pub(crate) fn push_context(&mut self, id: FeatureId, context: Context) {
        if let Some(feature) = self.features.get_mut(id.0 as usize) {
            feature.contexts.push(context);
        }
    }

    pub(crate) fn add_omni(&mut self, pattern: Plex, queries: Vec<StructureQuery>) -> OmniId {
        let id = OmniId(self.omnis.len() as u32);
        let feature = self.feature_for(FeatureKey::Omni(id));
        self.omnis.push(OmniPlex {
            id,
            pattern,
            queries,
            feature,
        });
        id
    }

    pub fn omni(&self, id: OmniId) -> Option<&OmniPlex> {
        self.omnis.get(id.0 as usize)
    }

    /// Every registered feature the paradigm displays, in feature registration order.
    ///
    /// Computed once per family; members of the family share the result.
    pub fn occurrences_in(&self, catalog: &Catalog, paradigm: &Plex) -> PlexResult<Vec<FeatureOccurrence>> {
        let mut found = Vec::new();
        for site in paradigm.free_sites(catalog) {
            let key = FeatureKey::FreeSite(SiteKey {
                mol_type: paradigm.mol_type(site.mol),
                site: site.site,
            });
            if let Some(feature) = self.lookup(&key) {
                found.push(FeatureOccurrence {
                    feature,
                    spec: ContextSpec::FreeSite(site),
                });
            }
        }
        for (idx, b) in paradigm.bindings().iter().enumerate() {
            let key = FeatureKey::binding(
                SiteKey {
                    mol_type: paradigm.mol_type(b.left.mol),
                    site: b.left.site,
                },
                SiteKey {
                    mol_type: paradigm.mol_type(b.right.mol),
                    site: b.right.site,
                },
            );
            if let Some(feature) = self.lookup(&key) {
                found.push(FeatureOccurrence {
                    feature,
                    spec: ContextSpec::Binding(idx),
                });
            }
        }
        for omni in &self.omnis {
            let search = IsoSearch::new(catalog, &omni.pattern, paradigm)?;
            if let Some(injection) = search.find_injection()? {
                if omni.satisfied_by(paradigm, &injection.forward) {
                    found.push(FeatureOccurrence {
                        feature: omni.feature,
                        spec: ContextSpec::Omni(injection.forward),
                    });
                }
            }
        }
        found.sort_by_key(|occ| occ.feature);
        Ok(found)
    }
}
