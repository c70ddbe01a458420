//! Complexes ("plexes"): mol instances joined by bindings between their sites.

use crate::mol::{Catalog, MolTypeId, MolTypeName, SiteName};
use error_stack::{ResultExt, bail, report};
use petgraph::graph::UnGraph;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

pub mod canon;
pub mod dot;
pub mod iso;
pub mod map;

pub use canon::{CanonicalEncoding, CanonicalForm, PartitionSignature};
pub use iso::IsoSearch;
pub use map::{Orientation, PlexIso, PlexMap};

/// A site occurrence inside one complex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("{mol}.{site}")]
pub struct SiteSpec {
    pub mol: usize,
    pub site: usize,
}

impl SiteSpec {
    pub fn new(mol: usize, site: usize) -> Self {
        SiteSpec { mol, site }
    }

    pub fn offset(self, by: usize) -> Self {
        SiteSpec {
            mol: self.mol + by,
            site: self.site,
        }
    }
}

/// An unordered pair of site occurrences.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[debug("{left:?}-{right:?}")]
pub struct Binding {
    pub left: SiteSpec,
    pub right: SiteSpec,
}

impl Binding {
    pub fn new(left: SiteSpec, right: SiteSpec) -> Self {
        Binding { left, right }
    }

    pub fn flipped(self) -> Self {
        Binding {
            left: self.right,
            right: self.left,
        }
    }

    /// The pair of mol indices, smaller first.
    pub fn mol_pair(&self) -> (usize, usize) {
        let (a, b) = (self.left.mol, self.right.mol);
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn offset(self, by: usize) -> Self {
        Binding {
            left: self.left.offset(by),
            right: self.right.offset(by),
        }
    }

    pub fn touches(&self, mol: usize) -> bool {
        self.left.mol == mol || self.right.mol == mol
    }

    /// The site at the opposite end from `mol`, if the binding touches `mol`.
    pub fn partner_of(&self, mol: usize) -> Option<SiteSpec> {
        if self.left.mol == mol {
            Some(self.right)
        } else if self.right.mol == mol {
            Some(self.left)
        } else {
            None
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlexError {
    #[error("mol {0} is bound to itself")]
    SelfBinding(usize),
    #[error("mols {0} and {1} are joined by more than one binding")]
    MultiBinding(usize, usize),
    #[error("mol index {mol} is out of range for a complex with {count} mols")]
    MolOutOfRange { mol: usize, count: usize },
    #[error("mol type {0:?} is not in the catalog")]
    UnknownMolTypeId(MolTypeId),
    #[error("unknown mol type {0}")]
    UnknownMolType(MolTypeName),
    #[error("mol type {mol_type} has no binding site {site}")]
    UnknownSite { mol_type: MolTypeName, site: SiteName },
    #[error("site index {site} is out of range for mol type {mol_type}")]
    SiteOutOfRange { mol_type: MolTypeName, site: usize },
    #[error("site {0:?} takes part in more than one binding")]
    SiteAlreadyBound(SiteSpec),
    #[error("complex has no mols")]
    Empty,
    #[error("pattern is not connected")]
    NotConnected,
    #[error("mol param for mol {mol} does not fit its mol type")]
    InvalidParam { mol: usize },
    #[error("expected {expected} mol params, got {actual}")]
    ParamCountMismatch { expected: usize, actual: usize },
    #[error("internal consistency failure: {0}")]
    Internal(&'static str),
}

/// Whether an error is the caller's fault or a defect in the algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StructuralInput,
    Internal,
}

impl PlexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlexError::Internal(_) => ErrorKind::Internal,
            _ => ErrorKind::StructuralInput,
        }
    }
}

pub type PlexResult<T> = error_stack::Result<T, PlexError>;

/// A complex: an ordered sequence of mol instances and an unordered list of bindings.
///
/// Construction does no checking. Call [`Plex::validate`] (or go through [`PlexBuilder`])
/// before handing a complex to recognition or pattern matching.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plex {
    mols: Vec<MolTypeId>,
    bindings: Vec<Binding>,
}

impl Plex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(mols: Vec<MolTypeId>, bindings: Vec<Binding>) -> Self {
        Plex { mols, bindings }
    }

    pub fn push_mol(&mut self, mol_type: MolTypeId) -> usize {
        self.mols.push(mol_type);
        self.mols.len() - 1
    }

    pub fn push_binding(&mut self, binding: Binding) -> usize {
        self.bindings.push(binding);
        self.bindings.len() - 1
    }

    pub fn mol_count(&self) -> usize {
        self.mols.len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn mols(&self) -> &[MolTypeId] {
        &self.mols
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn mol_type(&self, mol: usize) -> MolTypeId {
        self.mols[mol]
    }

    pub fn set_mol_type(&mut self, mol: usize, mol_type: MolTypeId) {
        self.mols[mol] = mol_type;
    }

    pub fn binding(&self, idx: usize) -> Binding {
        self.bindings[idx]
    }

    /// Index of the binding that occupies `site`, if any.
    pub fn binding_at(&self, site: SiteSpec) -> Option<usize> {
        self.bindings
            .iter()
            .position(|b| b.left == site || b.right == site)
    }

    pub fn is_site_free(&self, site: SiteSpec) -> bool {
        self.binding_at(site).is_none()
    }

    pub fn site_index(&self, catalog: &Catalog, mol: usize, site: &str) -> PlexResult<usize> {
        let mol_type = self.mols.get(mol).copied().ok_or(report!(PlexError::MolOutOfRange {
            mol,
            count: self.mols.len(),
        }))?;
        let mt = catalog
            .get(mol_type)
            .ok_or(report!(PlexError::UnknownMolTypeId(mol_type)))?;
        mt.site_index(site).ok_or(report!(PlexError::UnknownSite {
            mol_type: mt.name,
            site: site.into(),
        }))
    }

    /// Fails on the first self-binding or repeated mol pair.
    pub fn assert_simple_graph(&self) -> PlexResult<()> {
        let mut seen = HashSet::with_capacity(self.bindings.len());
        for binding in &self.bindings {
            if binding.left.mol == binding.right.mol {
                return Err(report!(PlexError::SelfBinding(binding.left.mol)))
                    .attach_printable_lazy(|| format!("in complex {self:?}"));
            }
            let pair = binding.mol_pair();
            if !seen.insert(pair) {
                return Err(report!(PlexError::MultiBinding(pair.0, pair.1)))
                    .attach_printable_lazy(|| format!("in complex {self:?}"));
            }
        }
        Ok(())
    }

    /// Full structural check against the catalog: indices in range, every site
    /// bound at most once, and the complex is a simple graph.
    pub fn validate(&self, catalog: &Catalog) -> PlexResult<()> {
        if self.mols.is_empty() {
            bail!(PlexError::Empty);
        }
        self.validate_structure(catalog)
    }

    /// Like [`Plex::validate`], but accepts a complex without mols.
    ///
    /// Every mol type must be in `catalog` and every binding must name mols and sites
    /// that exist.
    pub fn validate_structure(&self, catalog: &Catalog) -> PlexResult<()> {
        for mol_type in &self.mols {
            if catalog.get(*mol_type).is_none() {
                bail!(PlexError::UnknownMolTypeId(*mol_type));
            }
        }
        let mut occupied = HashSet::new();
        for binding in &self.bindings {
            for site in [binding.left, binding.right] {
                let mol_type = self.mols.get(site.mol).copied().ok_or(report!(
                    PlexError::MolOutOfRange {
                        mol: site.mol,
                        count: self.mols.len(),
                    }
                ))?;
                let mt = catalog.mol_type(mol_type);
                if site.site >= mt.site_count() {
                    bail!(PlexError::SiteOutOfRange {
                        mol_type: mt.name,
                        site: site.site,
                    });
                }
                if !occupied.insert(site) {
                    bail!(PlexError::SiteAlreadyBound(site));
                }
            }
        }
        self.assert_simple_graph()
    }

    /// All unbound binding sites, in mol order then site order.
    pub fn free_sites(&self, catalog: &Catalog) -> Vec<SiteSpec> {
        let bound: HashSet<SiteSpec> = self
            .bindings
            .iter()
            .flat_map(|b| [b.left, b.right])
            .collect();
        self.mols
            .iter()
            .enumerate()
            .flat_map(|(mol, mol_type)| {
                (0..catalog.mol_type(*mol_type).site_count()).map(move |site| SiteSpec { mol, site })
            })
            .filter(|site| !bound.contains(site))
            .collect()
    }

    /// For each mol, the indices of the bindings that touch it.
    pub fn mol_bindings(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.mols.len()];
        for (idx, binding) in self.bindings.iter().enumerate() {
            out[binding.left.mol].push(idx);
            if binding.right.mol != binding.left.mol {
                out[binding.right.mol].push(idx);
            }
        }
        out
    }

    pub fn as_graph(&self) -> UnGraph<MolTypeId, Binding> {
        let mut graph = UnGraph::with_capacity(self.mols.len(), self.bindings.len());
        let nodes: Vec<_> = self.mols.iter().map(|m| graph.add_node(*m)).collect();
        for binding in &self.bindings {
            graph.add_edge(nodes[binding.left.mol], nodes[binding.right.mol], *binding);
        }
        graph
    }

    pub fn is_connected(&self) -> bool {
        self.mols.len() <= 1 || petgraph::algo::connected_components(&self.as_graph()) == 1
    }

    /// The complex formed by appending `other`'s mols after ours, with `other`'s
    /// bindings offset accordingly. No new bindings are added.
    pub fn joined_with(&self, other: &Plex) -> Plex {
        let offset = self.mols.len();
        let mut joined = self.clone();
        joined.mols.extend_from_slice(&other.mols);
        joined
            .bindings
            .extend(other.bindings.iter().map(|b| b.offset(offset)));
        joined
    }

    /// Extracts the connected component containing `start`, ignoring the binding
    /// `skip` if given.
    ///
    /// The component's mols are numbered in breadth-first discovery order. The returned
    /// map sends component mols and bindings back to their indices in `self`.
    pub fn tracked_component(&self, start: usize, skip: Option<usize>) -> TrackedComponent {
        let mol_bindings = self.mol_bindings();
        let mut to_component: HashMap<usize, usize> = HashMap::new();
        let mut component = Plex::new();
        let mut embedding_mols = Vec::new();
        let mut embedding_bindings = Vec::new();
        let mut seen_bindings = HashSet::new();

        let mut queue = VecDeque::new();
        to_component.insert(start, component.push_mol(self.mols[start]));
        embedding_mols.push(start);
        queue.push_back(start);

        while let Some(mol) = queue.pop_front() {
            for &b_idx in &mol_bindings[mol] {
                if Some(b_idx) == skip || !seen_bindings.insert(b_idx) {
                    continue;
                }
                let binding = self.bindings[b_idx];
                let Some(partner) = binding.partner_of(mol) else {
                    continue;
                };
                if !to_component.contains_key(&partner.mol) {
                    to_component.insert(partner.mol, component.push_mol(self.mols[partner.mol]));
                    embedding_mols.push(partner.mol);
                    queue.push_back(partner.mol);
                }
                let remap = |s: SiteSpec| SiteSpec {
                    mol: to_component[&s.mol],
                    site: s.site,
                };
                component.push_binding(Binding::new(remap(binding.left), remap(binding.right)));
                embedding_bindings.push(b_idx);
            }
        }

        TrackedComponent {
            plex: component,
            embedding: PlexMap::from_total(embedding_mols, embedding_bindings),
        }
    }
}

/// A connected piece of a complex, together with where it came from.
#[derive(Clone, Debug)]
pub struct TrackedComponent {
    pub plex: Plex,
    /// Component indices to indices in the source complex.
    pub embedding: PlexMap,
}

impl TrackedComponent {
    pub fn covers(&self, source: &Plex) -> bool {
        self.plex.mol_count() == source.mol_count()
    }
}

/// Builds a validated [`Plex`] from molecule and site names.
pub struct PlexBuilder<'a> {
    catalog: &'a Catalog,
    plex: Plex,
}

impl<'a> PlexBuilder<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        PlexBuilder {
            catalog,
            plex: Plex::new(),
        }
    }

    pub fn add_mol(&mut self, mol_type: &str) -> PlexResult<usize> {
        let id = self
            .catalog
            .id_of(mol_type)
            .ok_or(report!(PlexError::UnknownMolType(mol_type.into())))?;
        Ok(self.plex.push_mol(id))
    }

    pub fn bind(
        &mut self,
        left_mol: usize,
        left_site: &str,
        right_mol: usize,
        right_site: &str,
    ) -> PlexResult<usize> {
        let left = SiteSpec::new(left_mol, self.plex.site_index(self.catalog, left_mol, left_site)?);
        let right = SiteSpec::new(
            right_mol,
            self.plex.site_index(self.catalog, right_mol, right_site)?,
        );
        Ok(self.plex.push_binding(Binding::new(left, right)))
    }

    pub fn build(self) -> PlexResult<Plex> {
        self.plex.validate(self.catalog)?;
        Ok(self.plex)
    }
}
