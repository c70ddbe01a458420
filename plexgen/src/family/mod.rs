//! Species families: structural equivalence classes of complexes, and the species
//! interned within them.

use crate::feature::FeatureOccurrence;
use crate::mol::{Catalog, Massive, MolParam};
use crate::network::ReactionId;
use crate::plex::canon::canonicalize;
use crate::plex::dot::DotCollector;
use crate::plex::iso::iso_from_forms;
use crate::plex::{CanonicalEncoding, CanonicalForm, Plex, PlexError, PlexIso, PlexResult};
use crate::util::log;
use derive_more::From;
use error_stack::{ResultExt, bail, report};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashMap;

mod name;

pub use name::{CanonicalNameAssembler, NameAssembler};

#[derive(Hash, Eq, PartialEq, derive_more::Debug, Clone, Copy, PartialOrd, Ord, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("F({_0})")]
pub struct FamilyId(pub u32);

#[derive(Hash, Eq, PartialEq, derive_more::Debug, Clone, Copy, PartialOrd, Ord, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("S({_0})")]
pub struct SpeciesId(pub u32);

/// A structural equivalence class of complexes.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PlexFamily {
    id: FamilyId,
    paradigm: Plex,
    canonical: CanonicalForm,
    #[cfg_attr(feature = "serde", serde(with = "serde_json_any_key::any_key_map"))]
    members: HashMap<Vec<MolParam>, SpeciesId>,
    member_order: Vec<SpeciesId>,
    features: Vec<FeatureOccurrence>,
}

impl PlexFamily {
    pub fn id(&self) -> FamilyId {
        self.id
    }

    /// The representative complex. Parameter vectors of members are aligned to its mols.
    pub fn paradigm(&self) -> &Plex {
        &self.paradigm
    }

    pub fn canonical_form(&self) -> &CanonicalForm {
        &self.canonical
    }

    pub fn members(&self) -> &[SpeciesId] {
        &self.member_order
    }

    pub fn member(&self, params: &[MolParam]) -> Option<SpeciesId> {
        self.members.get(params).copied()
    }

    /// The features this family's paradigm displays.
    pub fn features(&self) -> &[FeatureOccurrence] {
        &self.features
    }
}

/// Where a species stands in the expansion protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExpansionState {
    Born,
    Expanded(u32),
}

#[derive(Debug)]
pub struct Species {
    id: SpeciesId,
    family: FamilyId,
    mol_params: Vec<MolParam>,
    pub(crate) population: u64,
    weight: f64,
    pub(crate) name: OnceCell<String>,
    pub(crate) expansion: ExpansionState,
    pub(crate) reactant_of: Vec<ReactionId>,
}

impl Species {
    pub fn id(&self) -> SpeciesId {
        self.id
    }

    pub fn family(&self) -> FamilyId {
        self.family
    }

    pub fn mol_params(&self) -> &[MolParam] {
        &self.mol_params
    }

    pub fn population(&self) -> u64 {
        self.population
    }

    pub fn expansion(&self) -> ExpansionState {
        self.expansion
    }

    /// Reactions in which this species is consumed.
    pub fn reactant_of(&self) -> &[ReactionId] {
        &self.reactant_of
    }
}

impl Massive for Species {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// Result of recognizing a complex.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub family: FamilyId,
    /// From the recognized complex onto the family's paradigm.
    pub iso: PlexIso,
    pub is_new: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecognizerStats {
    pub recognitions: u64,
    pub canonicalizations: u64,
    pub cache_hits: u64,
}

/// Owns every family and species. Neither is ever removed.
#[derive(Debug, Default)]
pub struct Recognizer {
    families: Vec<PlexFamily>,
    by_encoding: HashMap<CanonicalEncoding, FamilyId>,
    species: Vec<Species>,
    cache: Option<HashMap<Plex, (FamilyId, PlexIso)>>,
    stats: RecognizerStats,
}

impl Recognizer {
    pub fn new(use_cache: bool) -> Self {
        Recognizer {
            cache: use_cache.then(HashMap::new),
            ..Default::default()
        }
    }

    /// Finds the family of `plex`, creating it if this structure has not been seen.
    ///
    /// A new family takes `plex` itself as its paradigm, so the returned iso is the
    /// identity. New families display no features; see [`Recognizer::recognize_with`].
    pub fn recognize(&mut self, catalog: &Catalog, plex: &Plex) -> PlexResult<Recognition> {
        self.recognize_with(catalog, plex, |_| Ok(Vec::new()))
    }

    /// Like [`Recognizer::recognize`], with `features` computing the feature occurrences
    /// of a new family from its paradigm.
    ///
    /// `features` runs before the family is registered. If it fails, nothing is recorded
    /// and the next recognition of the same structure tries again.
    pub fn recognize_with(
        &mut self,
        catalog: &Catalog,
        plex: &Plex,
        features: impl FnOnce(&Plex) -> PlexResult<Vec<FeatureOccurrence>>,
    ) -> PlexResult<Recognition> {
        self.stats.recognitions += 1;
        if let Some((family, iso)) = self.cache.as_ref().and_then(|c| c.get(plex)) {
            self.stats.cache_hits += 1;
            log::trace!("recognition cache hit for {family:?}");
            return Ok(Recognition {
                family: *family,
                iso: iso.clone(),
                is_new: false,
            });
        }

        plex.validate(catalog)?;
        self.stats.canonicalizations += 1;
        let form = canonicalize(plex, catalog);
        let recognition = match self.by_encoding.get(&form.encoding) {
            Some(&family) => {
                let known = &self.families[family.0 as usize];
                let iso = iso_from_forms(plex, &form, &known.paradigm, &known.canonical)
                    .attach_printable_lazy(|| format!("recognizing {plex:?} as {family:?}"))
                    .attach_printable_lazy(|| {
                        let mut dot = DotCollector::new();
                        dot.collect(plex, catalog);
                        dot.collect(&known.paradigm, catalog);
                        dot.finalize()
                    })?;
                Recognition {
                    family,
                    iso,
                    is_new: false,
                }
            }
            None => {
                let family = FamilyId(self.families.len() as u32);
                let features = features(plex)?;
                self.by_encoding.insert(form.encoding.clone(), family);
                log::debug!(
                    "new family {family:?} with {} mols and {} bindings displays {} features",
                    plex.mol_count(),
                    plex.binding_count(),
                    features.len()
                );
                self.families.push(PlexFamily {
                    id: family,
                    paradigm: plex.clone(),
                    canonical: form,
                    members: HashMap::new(),
                    member_order: Vec::new(),
                    features,
                });
                Recognition {
                    family,
                    iso: PlexIso::identity(plex),
                    is_new: true,
                }
            }
        };
        if let Some(cache) = self.cache.as_mut() {
            cache.insert(plex.clone(), (recognition.family, recognition.iso.clone()));
        }
        Ok(recognition)
    }

    /// Returns the unique species of `family` with these parameters, creating it on
    /// first request. The boolean is true when the species was just created.
    pub fn get_member(
        &mut self,
        catalog: &Catalog,
        family: FamilyId,
        params: Vec<MolParam>,
    ) -> PlexResult<(SpeciesId, bool)> {
        let Some(fam) = self.families.get(family.0 as usize) else {
            bail!(PlexError::Internal("family id was not issued by this recognizer"));
        };
        if params.len() != fam.paradigm.mol_count() {
            bail!(PlexError::ParamCountMismatch {
                expected: fam.paradigm.mol_count(),
                actual: params.len(),
            });
        }
        if let Some(existing) = fam.members.get(&params) {
            return Ok((*existing, false));
        }
        for (mol, param) in params.iter().enumerate() {
            let mol_type = catalog.mol_type(fam.paradigm.mol_type(mol));
            if param.state().mods.len() != mol_type.mod_sites.len() {
                return Err(report!(PlexError::InvalidParam { mol }))
                    .attach_printable_lazy(|| format!("{param:?} for mol type {}", mol_type.name));
            }
        }
        let weight: f64 = params
            .iter()
            .enumerate()
            .map(|(mol, p)| catalog.param_weight(fam.paradigm.mol_type(mol), p))
            .sum();

        let id = SpeciesId(self.species.len() as u32);
        self.species.push(Species {
            id,
            family,
            mol_params: params.clone(),
            population: 0,
            weight,
            name: OnceCell::new(),
            expansion: ExpansionState::Born,
            reactant_of: Vec::new(),
        });
        let fam = &mut self.families[family.0 as usize];
        fam.members.insert(params, id);
        fam.member_order.push(id);
        log::debug!("new species {id:?} in {family:?}");
        Ok((id, true))
    }

    pub fn family(&self, id: FamilyId) -> Option<&PlexFamily> {
        self.families.get(id.0 as usize)
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id.0 as usize)
    }

    pub(crate) fn species_mut(&mut self, id: SpeciesId) -> Option<&mut Species> {
        self.species.get_mut(id.0 as usize)
    }

    pub fn families(&self) -> &[PlexFamily] {
        &self.families
    }

    pub fn all_species(&self) -> &[Species] {
        &self.species
    }

    pub fn family_count(&self) -> usize {
        self.families.len()
    }

    pub fn species_count(&self) -> usize {
        self.species.len()
    }

    pub fn stats(&self) -> RecognizerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{ContextSpec, FeatureId};
    use crate::mol::MoleculeType;
    use crate::plex::PlexBuilder;

    fn catalog() -> Catalog {
        Catalog::builder()
            .modification("none", 0.0)
            .modification("phos", 80.0)
            .mol_type(
                MoleculeType::new("A", 100.0)
                    .with_site("a1")
                    .with_mod_site("p", "none"),
            )
            .mol_type(MoleculeType::new("B", 50.0).with_site("b1"))
            .build()
            .unwrap()
    }

    fn a_b(catalog: &Catalog, b_first: bool) -> Plex {
        let mut builder = PlexBuilder::new(catalog);
        let (a, b) = if b_first {
            let b = builder.add_mol("B").unwrap();
            (builder.add_mol("A").unwrap(), b)
        } else {
            let a = builder.add_mol("A").unwrap();
            (a, builder.add_mol("B").unwrap())
        };
        builder.bind(a, "a1", b, "b1").unwrap();
        builder.build().unwrap()
    }

    #[test_log::test]
    fn same_structure_same_family() {
        let catalog = catalog();
        let mut recognizer = Recognizer::new(true);
        let first = recognizer.recognize(&catalog, &a_b(&catalog, false)).unwrap();
        assert!(first.is_new);
        assert_eq!(first.iso, PlexIso::identity(&a_b(&catalog, false)));

        let second = recognizer.recognize(&catalog, &a_b(&catalog, true)).unwrap();
        assert!(!second.is_new);
        assert_eq!(second.family, first.family);
        // B at index 0 lands on the paradigm's B at index 1
        assert_eq!(second.iso.forward.mol(0), Some(1));

        let again = recognizer.recognize(&catalog, &a_b(&catalog, true)).unwrap();
        assert_eq!(again.iso, second.iso);
        assert_eq!(recognizer.stats().cache_hits, 1);
        assert_eq!(recognizer.stats().canonicalizations, 2);
        assert_eq!(recognizer.family_count(), 1);
    }

    #[test_log::test]
    fn failed_feature_lookup_registers_nothing() {
        let catalog = catalog();
        let mut recognizer = Recognizer::new(true);
        let plex = a_b(&catalog, false);
        let err = recognizer
            .recognize_with(&catalog, &plex, |_| Err(report!(PlexError::NotConnected)))
            .unwrap_err();
        assert_eq!(err.current_context(), &PlexError::NotConnected);
        assert_eq!(recognizer.family_count(), 0);

        let occurrence = FeatureOccurrence {
            feature: FeatureId(0),
            spec: ContextSpec::Binding(0),
        };
        let retried = recognizer
            .recognize_with(&catalog, &plex, |_| Ok(vec![occurrence.clone()]))
            .unwrap();
        assert!(retried.is_new);
        assert_eq!(recognizer.stats().cache_hits, 0);
        assert_eq!(
            recognizer.family(retried.family).unwrap().features(),
            &[occurrence]
        );
    }

    #[test_log::test]
    fn members_are_interned() {
        let catalog = catalog();
        let mut recognizer = Recognizer::new(false);
        let family = recognizer.recognize(&catalog, &a_b(&catalog, false)).unwrap().family;
        let a = catalog.id_of("A").unwrap();
        let b = catalog.id_of("B").unwrap();
        let params = vec![catalog.default_param(a), catalog.default_param(b)];

        let (s1, new1) = recognizer.get_member(&catalog, family, params.clone()).unwrap();
        let (s2, new2) = recognizer.get_member(&catalog, family, params.clone()).unwrap();
        assert!(new1);
        assert!(!new2);
        assert_eq!(s1, s2);
        assert_eq!(recognizer.species_count(), 1);
        assert_eq!(recognizer.species(s1).unwrap().weight(), 150.0);

        let phos = vec![
            catalog.default_param(a).with_modification(0, "phos".into()),
            catalog.default_param(b),
        ];
        let (s3, _) = recognizer.get_member(&catalog, family, phos).unwrap();
        assert_ne!(s1, s3);
        assert_eq!(recognizer.species(s3).unwrap().weight(), 230.0);
        assert_eq!(recognizer.family(family).unwrap().members(), &[s1, s3]);
    }

    #[test_log::test]
    fn wrong_param_count_is_rejected() {
        let catalog = catalog();
        let mut recognizer = Recognizer::new(false);
        let family = recognizer.recognize(&catalog, &a_b(&catalog, false)).unwrap().family;
        let err = recognizer
            .get_member(&catalog, family, vec![catalog.default_param(catalog.id_of("A").unwrap())])
            .unwrap_err();
        assert_eq!(
            err.current_context(),
            &PlexError::ParamCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
