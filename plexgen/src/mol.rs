//! The molecule catalog: immutable molecule type definitions and the vocabularies
//! (shapes, modifications) they draw on.

use crate::interned_string_newtype;
use crate::util::bimap::BiMap;
use crate::util::log;
use derive_more::From;
use error_stack::{Report, ResultExt, bail, report};
use internment::Intern;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

interned_string_newtype!(MolTypeName);
interned_string_newtype!(SiteName);
interned_string_newtype!(ShapeName);
interned_string_newtype!(ModificationName);

/// Index of a molecule type in its [`Catalog`].
#[derive(Hash, Eq, PartialEq, derive_more::Debug, Clone, Copy, PartialOrd, Ord, From)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("T{_0}")]
pub struct MolTypeId(pub u32);

impl MolTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Anything with a molecular weight.
pub trait Massive {
    fn weight(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BindingSiteSpec {
    pub name: SiteName,
    pub shapes: BTreeSet<ShapeName>,
    pub default_shape: ShapeName,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModSiteSpec {
    pub name: SiteName,
    pub default_modification: ModificationName,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Modification {
    pub name: ModificationName,
    pub weight_delta: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MoleculeType {
    pub name: MolTypeName,
    pub binding_sites: Vec<BindingSiteSpec>,
    pub mod_sites: Vec<ModSiteSpec>,
    pub weight: f64,
}

impl MoleculeType {
    pub fn new(name: impl Into<MolTypeName>, weight: f64) -> Self {
        MoleculeType {
            name: name.into(),
            binding_sites: Vec::new(),
            mod_sites: Vec::new(),
            weight,
        }
    }

    /// Adds a binding site with the given shape vocabulary.
    pub fn with_binding_site<S: Into<ShapeName>>(
        mut self,
        name: impl Into<SiteName>,
        shapes: impl IntoIterator<Item = S>,
        default_shape: impl Into<ShapeName>,
    ) -> Self {
        self.binding_sites.push(BindingSiteSpec {
            name: name.into(),
            shapes: shapes.into_iter().map(Into::into).collect(),
            default_shape: default_shape.into(),
        });
        self
    }

    /// Adds a binding site with the single shape `default`.
    pub fn with_site(self, name: impl Into<SiteName>) -> Self {
        self.with_binding_site(name, ["default"], "default")
    }

    pub fn with_mod_site(
        mut self,
        name: impl Into<SiteName>,
        default_modification: impl Into<ModificationName>,
    ) -> Self {
        self.mod_sites.push(ModSiteSpec {
            name: name.into(),
            default_modification: default_modification.into(),
        });
        self
    }

    pub fn site_count(&self) -> usize {
        self.binding_sites.len()
    }

    pub fn site_index(&self, name: &str) -> Option<usize> {
        self.binding_sites.iter().position(|s| &*s.name == name)
    }

    pub fn mod_site_index(&self, name: &str) -> Option<usize> {
        self.mod_sites.iter().position(|s| &*s.name == name)
    }

    pub fn default_state(&self) -> MolState {
        MolState {
            mods: self
                .mod_sites
                .iter()
                .map(|s| s.default_modification)
                .collect(),
        }
    }
}

impl Massive for MoleculeType {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// The internal state of one mol instance: one modification per modification site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MolState {
    pub mods: Vec<ModificationName>,
}

/// An interned [`MolState`]. Species parameter vectors hold one per mol instance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, derive_more::Debug)]
#[debug("{_0:?}")]
pub struct MolParam(Intern<MolState>);

impl MolParam {
    pub fn new(state: MolState) -> Self {
        MolParam(Intern::new(state))
    }

    pub fn state(&self) -> &MolState {
        &self.0
    }

    /// Returns a copy of this state with the modification at `mod_site` replaced.
    pub fn with_modification(&self, mod_site: usize, modification: ModificationName) -> Self {
        let mut state = MolState::clone(&self.0);
        if let Some(slot) = state.mods.get_mut(mod_site) {
            *slot = modification;
        }
        MolParam::new(state)
    }
}

impl From<MolState> for MolParam {
    fn from(value: MolState) -> Self {
        MolParam::new(value)
    }
}

impl PartialOrd for MolParam {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MolParam {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.state().cmp(other.state())
    }
}

#[cfg(feature = "serde")]
impl Serialize for MolParam {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.state().serialize(serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for MolParam {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let state = MolState::deserialize(deserializer)?;
        Ok(MolParam::new(state))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("duplicate molecule type {0}")]
    DuplicateMolType(MolTypeName),
    #[error("duplicate modification {0}")]
    DuplicateModification(ModificationName),
    #[error("molecule type {mol_type} declares site {site} twice")]
    DuplicateSite {
        mol_type: MolTypeName,
        site: SiteName,
    },
    #[error("default shape {shape} of site {mol_type}.{site} is not one of its shapes")]
    DefaultShapeNotInShapes {
        mol_type: MolTypeName,
        site: SiteName,
        shape: ShapeName,
    },
    #[error("unknown modification {modification} on {mol_type}.{site}")]
    UnknownModification {
        mol_type: MolTypeName,
        site: SiteName,
        modification: ModificationName,
    },
    #[error("molecule type {0} has a negative or non-finite weight")]
    InvalidWeight(MolTypeName),
}

pub type CatalogResult<T> = error_stack::Result<T, CatalogError>;

/// Immutable set of molecule types and modifications, fixed before any complex is built.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(into = "CatalogDescription", try_from = "CatalogDescription")
)]
pub struct Catalog {
    mol_types: Vec<MoleculeType>,
    names: BiMap<MolTypeName, MolTypeId>,
    modifications: BTreeMap<ModificationName, Modification>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.mol_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mol_types.is_empty()
    }

    pub fn get(&self, id: MolTypeId) -> Option<&MoleculeType> {
        self.mol_types.get(id.index())
    }

    /// Panics if `id` was not handed out by this catalog.
    pub fn mol_type(&self, id: MolTypeId) -> &MoleculeType {
        &self.mol_types[id.index()]
    }

    pub fn id_of(&self, name: &str) -> Option<MolTypeId> {
        self.names.get_left(&MolTypeName::from(name)).copied()
    }

    pub fn name_of(&self, id: MolTypeId) -> Option<MolTypeName> {
        self.names.get_right(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MolTypeId, &MoleculeType)> {
        self.mol_types
            .iter()
            .enumerate()
            .map(|(i, mt)| (MolTypeId(i as u32), mt))
    }

    pub fn modification(&self, name: &str) -> Option<&Modification> {
        self.modifications.get(&ModificationName::from(name))
    }

    pub fn default_param(&self, id: MolTypeId) -> MolParam {
        MolParam::new(self.mol_type(id).default_state())
    }

    /// Weight of one mol instance of type `id` in state `param`.
    pub fn param_weight(&self, id: MolTypeId, param: &MolParam) -> f64 {
        let delta: f64 = param
            .state()
            .mods
            .iter()
            .filter_map(|m| self.modifications.get(m))
            .map(|m| m.weight_delta)
            .sum();
        self.mol_type(id).weight() + delta
    }
}

/// Collects molecule types and modifications, then validates them into a [`Catalog`].
#[derive(Debug, Default, Clone)]
pub struct CatalogBuilder {
    mol_types: Vec<MoleculeType>,
    modifications: Vec<Modification>,
}

impl CatalogBuilder {
    pub fn modification(mut self, name: impl Into<ModificationName>, weight_delta: f64) -> Self {
        self.modifications.push(Modification {
            name: name.into(),
            weight_delta,
        });
        self
    }

    pub fn mol_type(mut self, mol_type: MoleculeType) -> Self {
        self.mol_types.push(mol_type);
        self
    }

    pub fn build(self) -> CatalogResult<Catalog> {
        let mut modifications = BTreeMap::new();
        for m in self.modifications {
            if modifications.contains_key(&m.name) {
                bail!(CatalogError::DuplicateModification(m.name));
            }
            modifications.insert(m.name, m);
        }

        let mut names = BiMap::new();
        for (idx, mt) in self.mol_types.iter().enumerate() {
            validate_mol_type(mt, &modifications)?;
            names
                .try_insert(mt.name, MolTypeId(idx as u32))
                .map_err(|(name, _)| report!(CatalogError::DuplicateMolType(name)))?;
        }

        log::debug!(
            "built catalog with {} molecule types and {} modifications",
            self.mol_types.len(),
            modifications.len()
        );
        Ok(Catalog {
            mol_types: self.mol_types,
            names,
            modifications,
        })
    }
}

fn validate_mol_type(
    mt: &MoleculeType,
    modifications: &BTreeMap<ModificationName, Modification>,
) -> CatalogResult<()> {
    if !mt.weight.is_finite() || mt.weight < 0.0 {
        bail!(CatalogError::InvalidWeight(mt.name));
    }
    let mut seen = BTreeSet::new();
    for site in &mt.binding_sites {
        if !seen.insert(site.name) {
            bail!(CatalogError::DuplicateSite {
                mol_type: mt.name,
                site: site.name,
            });
        }
        if !site.shapes.contains(&site.default_shape) {
            bail!(CatalogError::DefaultShapeNotInShapes {
                mol_type: mt.name,
                site: site.name,
                shape: site.default_shape,
            });
        }
    }
    for site in &mt.mod_sites {
        if !seen.insert(site.name) {
            bail!(CatalogError::DuplicateSite {
                mol_type: mt.name,
                site: site.name,
            });
        }
        if !modifications.contains_key(&site.default_modification) {
            return Err(report!(CatalogError::UnknownModification {
                mol_type: mt.name,
                site: site.name,
                modification: site.default_modification,
            }))
            .attach_printable("default modifications must be registered before the catalog is built");
        }
    }
    Ok(())
}

/// Serialized form of a [`Catalog`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CatalogDescription {
    pub mol_types: Vec<MoleculeType>,
    pub modifications: Vec<Modification>,
}

impl From<Catalog> for CatalogDescription {
    fn from(value: Catalog) -> Self {
        CatalogDescription {
            mol_types: value.mol_types,
            modifications: value.modifications.into_values().collect(),
        }
    }
}

impl TryFrom<CatalogDescription> for Catalog {
    type Error = Report<CatalogError>;

    fn try_from(value: CatalogDescription) -> Result<Self, Self::Error> {
        let builder = value
            .modifications
            .into_iter()
            .fold(Catalog::builder(), |b, m| b.modification(m.name, m.weight_delta));
        value
            .mol_types
            .into_iter()
            .fold(builder, CatalogBuilder::mol_type)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn builds_and_looks_up_by_name() {
        let catalog = Catalog::builder()
            .modification("none", 0.0)
            .modification("phos", 80.0)
            .mol_type(
                MoleculeType::new("A", 100.0)
                    .with_site("a1")
                    .with_mod_site("p", "none"),
            )
            .mol_type(MoleculeType::new("B", 50.0).with_site("b1"))
            .build()
            .unwrap();
        let a = catalog.id_of("A").unwrap();
        let b = catalog.id_of("B").unwrap();
        assert_ne!(a, b);
        assert_eq!(catalog.mol_type(a).site_index("a1"), Some(0));
        assert_eq!(catalog.mol_type(a).mod_site_index("p"), Some(0));
        assert_eq!(catalog.name_of(b).map(|n| n.to_string()), Some("B".to_string()));

        let default = catalog.default_param(a);
        assert_eq!(catalog.param_weight(a, &default), 100.0);
        let phos = default.with_modification(0, "phos".into());
        assert_eq!(catalog.param_weight(a, &phos), 180.0);
    }

    #[test_log::test]
    fn mol_params_are_interned() {
        let s1 = MolParam::new(MolState {
            mods: vec!["none".into()],
        });
        let s2 = MolParam::new(MolState {
            mods: vec!["none".into()],
        });
        assert_eq!(s1, s2);
        assert!(std::ptr::eq(s1.state(), s2.state()));
    }

    #[test_log::test]
    fn rejects_bad_definitions() {
        let dup = Catalog::builder()
            .mol_type(MoleculeType::new("A", 1.0))
            .mol_type(MoleculeType::new("A", 2.0))
            .build();
        assert!(matches!(
            dup.unwrap_err().current_context(),
            CatalogError::DuplicateMolType(_)
        ));

        let bad_shape = Catalog::builder()
            .mol_type(MoleculeType::new("A", 1.0).with_binding_site("a1", ["open"], "closed"))
            .build();
        assert!(matches!(
            bad_shape.unwrap_err().current_context(),
            CatalogError::DefaultShapeNotInShapes { .. }
        ));

        let unknown_mod = Catalog::builder()
            .mol_type(MoleculeType::new("A", 1.0).with_mod_site("p", "phos"))
            .build();
        assert!(matches!(
            unknown_mod.unwrap_err().current_context(),
            CatalogError::UnknownModification { .. }
        ));
    }
}
