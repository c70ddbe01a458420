use super::canon::{CanonicalForm, PartitionSignature, canonicalize};
use super::dot::DotCollector;
use super::{Plex, PlexError, PlexIso, PlexMap, PlexResult};
use crate::mol::{Catalog, MolTypeId};
use crate::util::log;
use error_stack::{ResultExt, bail, report};
use std::cell::Cell;
use std::collections::HashMap;

/// Isomorphism and sub-complex search between a `left` and a `right` complex.
///
/// For [`IsoSearch::find_injection`] `left` is the pattern and `right` the target.
pub struct IsoSearch<'a> {
    catalog: &'a Catalog,
    left: &'a Plex,
    right: &'a Plex,
    canonicalizations: Cell<usize>,
}

impl<'a> IsoSearch<'a> {
    /// Both complexes are checked against `catalog` first. Out-of-range mols or sites,
    /// unknown mol types and non-simple graphs are reported as structural errors.
    pub fn new(catalog: &'a Catalog, left: &'a Plex, right: &'a Plex) -> PlexResult<Self> {
        left.validate_structure(catalog)
            .attach_printable("left complex of isomorphism search")?;
        right
            .validate_structure(catalog)
            .attach_printable("right complex of isomorphism search")?;
        Ok(IsoSearch {
            catalog,
            left,
            right,
            canonicalizations: Cell::new(0),
        })
    }

    /// How many complexes this search has canonicalized so far.
    pub fn canonicalizations(&self) -> usize {
        self.canonicalizations.get()
    }

    fn canonicalize(&self, plex: &Plex) -> CanonicalForm {
        self.canonicalizations.set(self.canonicalizations.get() + 1);
        canonicalize(plex, self.catalog)
    }

    /// Finds an isomorphism from `left` onto `right`.
    ///
    /// `Ok(None)` means the complexes are not isomorphic. An error means the derived
    /// correspondence was inconsistent, which is a bug.
    pub fn find_iso(&self) -> PlexResult<Option<PlexIso>> {
        if self.left.mol_count() != self.right.mol_count()
            || self.left.binding_count() != self.right.binding_count()
        {
            return Ok(None);
        }
        if PartitionSignature::of(self.left, self.catalog)
            != PartitionSignature::of(self.right, self.catalog)
        {
            log::trace!("partition signatures differ");
            return Ok(None);
        }
        let left_form = self.canonicalize(self.left);
        let right_form = self.canonicalize(self.right);
        if left_form.encoding != right_form.encoding {
            return Ok(None);
        }
        iso_from_forms(self.left, &left_form, self.right, &right_form)
            .attach_printable_lazy(|| {
                let mut dot = DotCollector::new();
                dot.collect(self.left, self.catalog);
                dot.collect(self.right, self.catalog);
                dot.finalize()
            })
            .map(Some)
    }

    pub fn is_isomorphic(&self) -> PlexResult<bool> {
        Ok(self.find_iso()?.is_some())
    }

    /// Finds an embedding of the pattern `left` into `right`.
    ///
    /// Pattern bindings are placed in order, each against every target binding in turn,
    /// backtracking on failure. A single free mol is matched by type. A pattern with
    /// several mols and no bindings is rejected as not connected.
    pub fn find_injection(&self) -> PlexResult<Option<PlexIso>> {
        let pattern = self.left;
        let target = self.right;
        if pattern.mol_count() == 0 {
            bail!(PlexError::Empty);
        }
        if pattern.binding_count() == 0 {
            if pattern.mol_count() > 1 {
                return Err(report!(PlexError::NotConnected))
                    .attach_printable_lazy(|| format!("pattern {pattern:?}"));
            }
            for tgt_mol in 0..target.mol_count() {
                let mut iso = PlexIso::unmapped(pattern, target);
                if iso.try_map_mol(pattern, 0, target, tgt_mol) {
                    return Ok(Some(iso));
                }
            }
            return Ok(None);
        }
        if !type_counts_fit(pattern, target) {
            return Ok(None);
        }
        Ok(self.map_rest_bindings(0, PlexIso::unmapped(pattern, target)))
    }

    fn map_rest_bindings(&self, pattern_binding: usize, current: PlexIso) -> Option<PlexIso> {
        if pattern_binding >= self.left.binding_count() {
            return Some(current);
        }
        for tgt_binding in 0..self.right.binding_count() {
            let mut trial = current.clone();
            if trial.try_map_binding(self.left, pattern_binding, self.right, tgt_binding) {
                if let Some(done) = self.map_rest_bindings(pattern_binding + 1, trial) {
                    return Some(done);
                }
            }
        }
        None
    }
}

fn type_counts_fit(pattern: &Plex, target: &Plex) -> bool {
    if pattern.mol_count() > target.mol_count() || pattern.binding_count() > target.binding_count()
    {
        return false;
    }
    let mut counts: HashMap<MolTypeId, isize> = HashMap::new();
    for m in target.mols() {
        *counts.entry(*m).or_default() += 1;
    }
    for m in pattern.mols() {
        let c = counts.entry(*m).or_default();
        *c -= 1;
        if *c < 0 {
            return false;
        }
    }
    true
}

/// Derives the isomorphism between two complexes with equal canonical encodings.
pub(crate) fn iso_from_forms(
    left: &Plex,
    left_form: &CanonicalForm,
    right: &Plex,
    right_form: &CanonicalForm,
) -> PlexResult<PlexIso> {
    if left_form.encoding != right_form.encoding || left.mol_count() != left_form.order.len() {
        bail!(PlexError::Internal("canonical forms do not describe the same structure"));
    }
    let left_pos = left_form.positions();
    let mol_map: Vec<usize> = (0..left.mol_count())
        .map(|m| right_form.order[left_pos[m]])
        .collect();

    let by_pair: HashMap<(usize, usize), usize> = right
        .bindings()
        .iter()
        .enumerate()
        .map(|(idx, b)| (b.mol_pair(), idx))
        .collect();

    let mut binding_map = Vec::with_capacity(left.binding_count());
    for (idx, b) in left.bindings().iter().enumerate() {
        let (l, r) = (mol_map[b.left.mol], mol_map[b.right.mol]);
        let key = if l <= r { (l, r) } else { (r, l) };
        let Some(&tgt_idx) = by_pair.get(&key) else {
            return Err(report!(PlexError::Internal(
                "derived correspondence does not reproduce a binding"
            )))
            .attach_printable_lazy(|| format!("left binding {idx} ({b:?})"));
        };
        let t = right.binding(tgt_idx);
        let aligned = t.left.mol == l && t.right.mol == r;
        let (tl, tr) = if aligned { (t.left, t.right) } else { (t.right, t.left) };
        if tl.site != b.left.site || tr.site != b.right.site {
            return Err(report!(PlexError::Internal(
                "derived correspondence maps a binding onto different sites"
            )))
            .attach_printable_lazy(|| format!("left binding {idx} ({b:?}), right binding {t:?}"));
        }
        binding_map.push(tgt_idx);
    }

    let forward = PlexMap::from_total(mol_map, binding_map);
    let mut back_mols = vec![0; right.mol_count()];
    for (src, tgt) in forward.mol_map().iter().enumerate() {
        if let Some(tgt) = tgt {
            back_mols[*tgt] = src;
        }
    }
    let mut back_bindings = vec![0; right.binding_count()];
    for (src, tgt) in forward.binding_map().iter().enumerate() {
        if let Some(tgt) = tgt {
            back_bindings[*tgt] = src;
        }
    }
    Ok(PlexIso {
        forward,
        backward: PlexMap::from_total(back_mols, back_bindings),
    })
}

/// Whether `a` and `b` are isomorphic.
pub fn is_isomorphic(catalog: &Catalog, a: &Plex, b: &Plex) -> PlexResult<bool> {
    IsoSearch::new(catalog, a, b)?.is_isomorphic()
}

/// Finds where `pattern` occurs in `target`, if anywhere.
pub fn occurs_in(catalog: &Catalog, pattern: &Plex, target: &Plex) -> PlexResult<Option<PlexIso>> {
    IsoSearch::new(catalog, pattern, target)?.find_injection()
}
