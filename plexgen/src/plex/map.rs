use super::{Binding, Plex, SiteSpec};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which way round a source binding lands on a target binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// left to left, right to right
    Aligned,
    /// left to right, right to left
    Flipped,
}

impl Orientation {
    fn apply(self, binding: Binding) -> Binding {
        match self {
            Orientation::Aligned => binding,
            Orientation::Flipped => binding.flipped(),
        }
    }
}

/// A partial structure-preserving map from the mols and bindings of one complex
/// to those of another.
///
/// Equality, hashing and ordering look only at the two index arrays, so a map can key
/// a table of the reactions it produced.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlexMap {
    mol_map: Vec<Option<usize>>,
    binding_map: Vec<Option<usize>>,
}

impl PlexMap {
    pub fn unmapped(mol_count: usize, binding_count: usize) -> Self {
        PlexMap {
            mol_map: vec![None; mol_count],
            binding_map: vec![None; binding_count],
        }
    }

    pub fn identity(mol_count: usize, binding_count: usize) -> Self {
        PlexMap {
            mol_map: (0..mol_count).map(Some).collect(),
            binding_map: (0..binding_count).map(Some).collect(),
        }
    }

    pub fn from_total(mol_map: Vec<usize>, binding_map: Vec<usize>) -> Self {
        PlexMap {
            mol_map: mol_map.into_iter().map(Some).collect(),
            binding_map: binding_map.into_iter().map(Some).collect(),
        }
    }

    pub fn mol(&self, src_mol: usize) -> Option<usize> {
        self.mol_map.get(src_mol).copied().flatten()
    }

    pub fn binding(&self, src_binding: usize) -> Option<usize> {
        self.binding_map.get(src_binding).copied().flatten()
    }

    pub fn mol_map(&self) -> &[Option<usize>] {
        &self.mol_map
    }

    pub fn binding_map(&self) -> &[Option<usize>] {
        &self.binding_map
    }

    pub fn site(&self, site: SiteSpec) -> Option<SiteSpec> {
        self.mol(site.mol).map(|mol| SiteSpec {
            mol,
            site: site.site,
        })
    }

    pub fn is_total(&self) -> bool {
        self.mol_map.iter().all(Option::is_some) && self.binding_map.iter().all(Option::is_some)
    }

    pub fn can_map_mol(&self, src: &Plex, src_mol: usize, tgt: &Plex, tgt_mol: usize) -> bool {
        match self.mol_map[src_mol] {
            Some(mapped) => mapped == tgt_mol,
            None => src.mol_type(src_mol) == tgt.mol_type(tgt_mol),
        }
    }

    pub fn can_map_site(&self, src: &Plex, src_site: SiteSpec, tgt: &Plex, tgt_site: SiteSpec) -> bool {
        self.can_map_mol(src, src_site.mol, tgt, tgt_site.mol) && src_site.site == tgt_site.site
    }

    /// Checks whether source binding `src_binding` can land on target binding
    /// `tgt_binding` in the given orientation.
    pub fn can_map_binding_as(
        &self,
        src: &Plex,
        src_binding: usize,
        tgt: &Plex,
        tgt_binding: usize,
        orientation: Orientation,
    ) -> bool {
        if let Some(mapped) = self.binding_map[src_binding] {
            if mapped != tgt_binding {
                return false;
            }
        }
        let s = src.binding(src_binding);
        let t = orientation.apply(tgt.binding(tgt_binding));
        self.can_map_site(src, s.left, tgt, t.left) && self.can_map_site(src, s.right, tgt, t.right)
    }

    /// The first orientation (aligned before flipped) in which the bindings can be matched.
    pub fn can_map_binding(
        &self,
        src: &Plex,
        src_binding: usize,
        tgt: &Plex,
        tgt_binding: usize,
    ) -> Option<Orientation> {
        [Orientation::Aligned, Orientation::Flipped]
            .into_iter()
            .find(|o| self.can_map_binding_as(src, src_binding, tgt, tgt_binding, *o))
    }

    /// Commits a binding match found by [`PlexMap::can_map_binding`].
    pub fn do_map_binding(
        &mut self,
        src: &Plex,
        src_binding: usize,
        tgt: &Plex,
        tgt_binding: usize,
        orientation: Orientation,
    ) {
        let s = src.binding(src_binding);
        let t = orientation.apply(tgt.binding(tgt_binding));
        self.mol_map[s.left.mol] = Some(t.left.mol);
        self.mol_map[s.right.mol] = Some(t.right.mol);
        self.binding_map[src_binding] = Some(tgt_binding);
    }

    pub(crate) fn set_mol(&mut self, src_mol: usize, tgt_mol: usize) {
        self.mol_map[src_mol] = Some(tgt_mol);
    }

    /// Composes `self: A -> B` with `then: B -> C`.
    pub fn then(&self, then: &PlexMap) -> PlexMap {
        PlexMap {
            mol_map: self.mol_map.iter().map(|m| m.and_then(|m| then.mol(m))).collect(),
            binding_map: self
                .binding_map
                .iter()
                .map(|b| b.and_then(|b| then.binding(b)))
                .collect(),
        }
    }

    /// Pulls a per-mol vector on the target side back to the source side.
    ///
    /// Returns `None` if some source mol is unmapped or maps out of range.
    pub fn pull_back<T: Clone>(&self, target_values: &[T]) -> Option<Vec<T>> {
        self.mol_map
            .iter()
            .map(|m| m.and_then(|m| target_values.get(m).cloned()))
            .collect()
    }
}

/// A pair of mutually inverse maps between two complexes.
///
/// During a search both halves are partial; once every source binding and mol is
/// placed the forward half is total.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlexIso {
    pub forward: PlexMap,
    pub backward: PlexMap,
}

impl PlexIso {
    pub fn unmapped(src: &Plex, tgt: &Plex) -> Self {
        PlexIso {
            forward: PlexMap::unmapped(src.mol_count(), src.binding_count()),
            backward: PlexMap::unmapped(tgt.mol_count(), tgt.binding_count()),
        }
    }

    pub fn identity(plex: &Plex) -> Self {
        PlexIso {
            forward: PlexMap::identity(plex.mol_count(), plex.binding_count()),
            backward: PlexMap::identity(plex.mol_count(), plex.binding_count()),
        }
    }

    /// Maps mol `src_mol` to `tgt_mol` if that is consistent in both directions.
    pub fn try_map_mol(&mut self, src: &Plex, src_mol: usize, tgt: &Plex, tgt_mol: usize) -> bool {
        if self.forward.can_map_mol(src, src_mol, tgt, tgt_mol)
            && self.backward.can_map_mol(tgt, tgt_mol, src, src_mol)
        {
            self.forward.set_mol(src_mol, tgt_mol);
            self.backward.set_mol(tgt_mol, src_mol);
            true
        } else {
            false
        }
    }

    /// Maps source binding `src_binding` onto target binding `tgt_binding` if some
    /// orientation is consistent in both directions, keeping the two halves inverse.
    pub fn try_map_binding(
        &mut self,
        src: &Plex,
        src_binding: usize,
        tgt: &Plex,
        tgt_binding: usize,
    ) -> bool {
        let orientation = [Orientation::Aligned, Orientation::Flipped]
            .into_iter()
            .find(|o| {
                self.forward
                    .can_map_binding_as(src, src_binding, tgt, tgt_binding, *o)
                    && self
                        .backward
                        .can_map_binding_as(tgt, tgt_binding, src, src_binding, *o)
            });
        match orientation {
            Some(o) => {
                self.forward.do_map_binding(src, src_binding, tgt, tgt_binding, o);
                self.backward.do_map_binding(tgt, tgt_binding, src, src_binding, o);
                true
            }
            None => false,
        }
    }

    pub fn inverse(&self) -> PlexIso {
        PlexIso {
            forward: self.backward.clone(),
            backward: self.forward.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mol::MolTypeId;

    const A: MolTypeId = MolTypeId(0);
    const B: MolTypeId = MolTypeId(1);

    fn ab() -> Plex {
        Plex::from_parts(
            vec![A, B],
            vec![Binding::new(SiteSpec::new(0, 0), SiteSpec::new(1, 0))],
        )
    }

    fn ba() -> Plex {
        Plex::from_parts(
            vec![B, A],
            vec![Binding::new(SiteSpec::new(0, 0), SiteSpec::new(1, 0))],
        )
    }

    #[test_log::test]
    fn can_map_mol_requires_same_type_or_same_image() {
        let src = ab();
        let tgt = ba();
        let mut map = PlexMap::unmapped(2, 1);
        assert!(map.can_map_mol(&src, 0, &tgt, 1));
        assert!(!map.can_map_mol(&src, 0, &tgt, 0));
        map.set_mol(0, 1);
        assert!(map.can_map_mol(&src, 0, &tgt, 1));
        assert!(!map.can_map_mol(&src, 0, &tgt, 0));
    }

    #[test_log::test]
    fn binding_maps_flipped_when_needed() {
        let src = ab();
        let tgt = ba();
        let mut map = PlexMap::unmapped(2, 1);
        let orientation = map.can_map_binding(&src, 0, &tgt, 0);
        assert_eq!(orientation, Some(Orientation::Flipped));
        map.do_map_binding(&src, 0, &tgt, 0, Orientation::Flipped);
        assert_eq!(map.mol(0), Some(1));
        assert_eq!(map.mol(1), Some(0));
        assert_eq!(map.binding(0), Some(0));
        assert!(map.is_total());
    }

    #[test_log::test]
    fn iso_rejects_non_injective_extension() {
        // A0-A1 and A1-A2 (sites 1 -> 0), pattern path A-A-A onto a single A-A edge.
        let path = Plex::from_parts(
            vec![A, A, A],
            vec![
                Binding::new(SiteSpec::new(0, 1), SiteSpec::new(1, 0)),
                Binding::new(SiteSpec::new(1, 1), SiteSpec::new(2, 0)),
            ],
        );
        let edge = Plex::from_parts(
            vec![A, A],
            vec![Binding::new(SiteSpec::new(0, 1), SiteSpec::new(1, 0))],
        );
        let mut iso = PlexIso::unmapped(&path, &edge);
        assert!(iso.try_map_binding(&path, 0, &edge, 0));
        assert!(!iso.try_map_binding(&path, 1, &edge, 0));
    }

    #[test_log::test]
    fn maps_compare_by_contents() {
        let a = PlexMap::identity(2, 1);
        let b = PlexMap::from_total(vec![0, 1], vec![0]);
        assert_eq!(a, b);
        assert_ne!(a, PlexMap::from_total(vec![1, 0], vec![0]));
        assert_eq!(a.then(&b), a);
        assert_eq!(a.pull_back(&["x", "y"]), Some(vec!["x", "y"]));
    }
}
