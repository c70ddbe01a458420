mod util;

use petgraph::algo::general_subgraph_monomorphisms_iter;
use petgraph::prelude::DiGraphMap;
use plexgen::mol::{Catalog, MolTypeId};
use plexgen::plex::canon::canonicalize;
use plexgen::plex::iso::{is_isomorphic, occurs_in};
use plexgen::plex::{Binding, IsoSearch, Plex, SiteSpec};
use proptest::collection::vec;
use proptest::prelude::*;
use proptest::sample::Index;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::hash::RandomState;
use util::mixed_catalog;

type Oracle = DiGraphMap<u32, (usize, usize), RandomState>;

/// Grows a random spanning tree, then closes a few extra bindings between distinct,
/// not yet bound mols. Every type in the mixed catalog has at least two sites, so the
/// tree always has a free site to attach to.
fn build_complex(catalog: &Catalog, types: &[u32], attach: &[(Index, Index)], extra: &[(Index, Index)]) -> Plex {
    let mut plex = Plex::from_parts(types.iter().map(|t| MolTypeId(*t)).collect(), Vec::new());
    for mol in 1..plex.mol_count() {
        let free = plex.free_sites(catalog);
        let earlier: Vec<SiteSpec> = free.iter().copied().filter(|s| s.mol < mol).collect();
        let own: Vec<SiteSpec> = free.iter().copied().filter(|s| s.mol == mol).collect();
        let (pick_earlier, pick_own) = attach[mol - 1];
        plex.push_binding(Binding::new(
            earlier[pick_earlier.index(earlier.len())],
            own[pick_own.index(own.len())],
        ));
    }
    for (a, b) in extra {
        let free = plex.free_sites(catalog);
        if free.len() < 2 {
            break;
        }
        let left = free[a.index(free.len())];
        let right = free[b.index(free.len())];
        let pair = Binding::new(left, right).mol_pair();
        if left.mol == right.mol || plex.bindings().iter().any(|x| x.mol_pair() == pair) {
            continue;
        }
        plex.push_binding(Binding::new(left, right));
    }
    plex
}

prop_compose! {
    fn arb_complex(max_mols: usize)(
        types in vec(0u32..4, 1..=max_mols),
        attach in vec((any::<Index>(), any::<Index>()), max_mols),
        extra in vec((any::<Index>(), any::<Index>()), 0..4),
    ) -> Plex {
        build_complex(&mixed_catalog(), &types, &attach, &extra)
    }
}

/// `perm[old] = new`; bindings are reordered by `order` and flipped where `flips` says.
fn relabel(plex: &Plex, perm: &[usize], order: &[usize], flips: &[bool]) -> Plex {
    let mut mols = vec![MolTypeId(0); plex.mol_count()];
    for (old, &new) in perm.iter().enumerate() {
        mols[new] = plex.mol_type(old);
    }
    let bindings = order
        .iter()
        .zip(flips)
        .map(|(&old, &flip)| {
            let b = plex.binding(old);
            let moved = Binding::new(
                SiteSpec::new(perm[b.left.mol], b.left.site),
                SiteSpec::new(perm[b.right.mol], b.right.site),
            );
            if flip { moved.flipped() } else { moved }
        })
        .collect();
    Plex::from_parts(mols, bindings)
}

fn arb_relabelled(max_mols: usize) -> impl Strategy<Value = (Plex, Plex)> {
    arb_complex(max_mols)
        .prop_flat_map(|plex| {
            let n = plex.mol_count();
            let m = plex.binding_count();
            (
                Just(plex),
                Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
                Just((0..m).collect::<Vec<_>>()).prop_shuffle(),
                vec(any::<bool>(), m),
            )
        })
        .prop_map(|(plex, perm, order, flips)| {
            let relabelled = relabel(&plex, &perm, &order, &flips);
            (plex, relabelled)
        })
}

fn oracle_graph(plex: &Plex) -> Oracle {
    let mut graph = DiGraphMap::default();
    for mol in 0..plex.mol_count() {
        graph.add_node(mol as u32);
    }
    for b in plex.bindings() {
        graph.add_edge(b.left.mol as u32, b.right.mol as u32, (b.left.site, b.right.site));
        graph.add_edge(b.right.mol as u32, b.left.mol as u32, (b.right.site, b.left.site));
    }
    graph
}

/// Whether petgraph finds an injective, type- and site-preserving map of `pattern`
/// into `target`.
fn oracle_embeds(pattern: &Plex, target: &Plex) -> bool {
    let pattern_graph = oracle_graph(pattern);
    let target_graph = oracle_graph(target);
    let pattern_ref = &pattern_graph;
    let target_ref = &target_graph;
    let mut nm = |p: &u32, t: &u32| pattern.mol_type(*p as usize) == target.mol_type(*t as usize);
    let mut em = |p: &(usize, usize), t: &(usize, usize)| p == t;
    general_subgraph_monomorphisms_iter(&pattern_ref, &target_ref, &mut nm, &mut em)
        .is_some_and(|mut isos| isos.next().is_some())
}

fn oracle_isomorphic(a: &Plex, b: &Plex) -> bool {
    a.mol_count() == b.mol_count() && a.binding_count() == b.binding_count() && oracle_embeds(a, b)
}

/// A few short chains plus loose mols. Every type has sites 0 and 1, so each chain
/// binds site 1 of one mol to site 0 of the next.
fn scattered_complex(rng: &mut StdRng) -> Plex {
    let mut plex = Plex::new();
    for _ in 0..rng.random_range(1..5) {
        let len = rng.random_range(1..4);
        for i in 0..len {
            let mol = plex.push_mol(MolTypeId(rng.random_range(0..4)));
            if i > 0 {
                plex.push_binding(Binding::new(SiteSpec::new(mol - 1, 1), SiteSpec::new(mol, 0)));
            }
        }
    }
    for _ in 0..rng.random_range(0..10) {
        plex.push_mol(MolTypeId(rng.random_range(0..4)));
    }
    plex
}

#[test_log::test]
fn scattered_complexes_survive_shuffling() {
    let catalog = mixed_catalog();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..40 {
        let plex = scattered_complex(&mut rng);
        let mut perm: Vec<usize> = (0..plex.mol_count()).collect();
        perm.shuffle(&mut rng);
        let mut order: Vec<usize> = (0..plex.binding_count()).collect();
        order.shuffle(&mut rng);
        let flips: Vec<bool> = order.iter().map(|_| rng.random_bool(0.5)).collect();
        let shuffled = relabel(&plex, &perm, &order, &flips);

        assert!(oracle_isomorphic(&plex, &shuffled));
        assert_eq!(
            canonicalize(&plex, &catalog).encoding,
            canonicalize(&shuffled, &catalog).encoding
        );
        let iso = IsoSearch::new(&catalog, &plex, &shuffled)
            .unwrap()
            .find_iso()
            .unwrap()
            .unwrap();
        assert!(iso.forward.is_total());
        for mol in 0..plex.mol_count() {
            assert_eq!(plex.mol_type(mol), shuffled.mol_type(iso.forward.mol(mol).unwrap()));
        }
    }
}

proptest! {
    #[test]
    fn relabelling_preserves_isomorphism((plex, relabelled) in arb_relabelled(7)) {
        let catalog = mixed_catalog();
        prop_assert!(is_isomorphic(&catalog, &plex, &relabelled).unwrap());
        prop_assert_eq!(
            canonicalize(&plex, &catalog).encoding,
            canonicalize(&relabelled, &catalog).encoding
        );
    }

    #[test]
    fn derived_iso_maps_every_binding((plex, relabelled) in arb_relabelled(7)) {
        let catalog = mixed_catalog();
        let search = IsoSearch::new(&catalog, &plex, &relabelled).unwrap();
        let iso = search.find_iso().unwrap().unwrap();
        prop_assert!(iso.forward.is_total());
        prop_assert!(iso.backward.is_total());
        for (idx, b) in plex.bindings().iter().enumerate() {
            let image = relabelled.binding(iso.forward.binding(idx).unwrap());
            let l = iso.forward.site(b.left).unwrap();
            let r = iso.forward.site(b.right).unwrap();
            prop_assert!(image == Binding::new(l, r) || image == Binding::new(r, l));
        }
        for mol in 0..plex.mol_count() {
            let there = iso.forward.mol(mol).unwrap();
            prop_assert_eq!(plex.mol_type(mol), relabelled.mol_type(there));
            prop_assert_eq!(iso.backward.mol(there), Some(mol));
        }
    }

    #[test]
    fn isomorphism_is_symmetric_and_agrees_with_vf2(a in arb_complex(5), b in arb_complex(5)) {
        let catalog = mixed_catalog();
        let ab = is_isomorphic(&catalog, &a, &b).unwrap();
        prop_assert_eq!(ab, is_isomorphic(&catalog, &b, &a).unwrap());
        prop_assert_eq!(ab, oracle_isomorphic(&a, &b));
        prop_assert!(is_isomorphic(&catalog, &a, &a).unwrap());
    }

    #[test]
    fn isomorphism_is_transitive((plex, first) in arb_relabelled(6), perm_seed in any::<Index>()) {
        let catalog = mixed_catalog();
        // rotate the mols of the relabelled copy once more
        let n = first.mol_count();
        let shift = perm_seed.index(n);
        let perm: Vec<usize> = (0..n).map(|m| (m + shift) % n).collect();
        let order: Vec<usize> = (0..first.binding_count()).rev().collect();
        let flips = vec![true; first.binding_count()];
        let second = relabel(&first, &perm, &order, &flips);
        prop_assert!(is_isomorphic(&catalog, &plex, &first).unwrap());
        prop_assert!(is_isomorphic(&catalog, &first, &second).unwrap());
        prop_assert!(is_isomorphic(&catalog, &plex, &second).unwrap());
    }

    #[test]
    fn canonicalization_is_stable(plex in arb_complex(7)) {
        let catalog = mixed_catalog();
        prop_assert_eq!(canonicalize(&plex, &catalog), canonicalize(&plex, &catalog));
    }

    #[test]
    fn injection_agrees_with_vf2(pattern in arb_complex(3), target in arb_complex(6)) {
        let catalog = mixed_catalog();
        let found = occurs_in(&catalog, &pattern, &target).unwrap();
        prop_assert_eq!(found.is_some(), oracle_embeds(&pattern, &target));
        if let Some(injection) = found {
            let images: HashSet<usize> = (0..pattern.mol_count())
                .map(|m| injection.forward.mol(m).unwrap())
                .collect();
            prop_assert_eq!(images.len(), pattern.mol_count());
            for (idx, b) in pattern.bindings().iter().enumerate() {
                let image = target.binding(injection.forward.binding(idx).unwrap());
                let l = injection.forward.site(b.left).unwrap();
                let r = injection.forward.site(b.right).unwrap();
                prop_assert!(image == Binding::new(l, r) || image == Binding::new(r, l));
            }
        }
    }
}
