#![allow(dead_code)]

use plexgen::prelude::*;

/// `A` with one site `a1`, `B` with one site `b1`.
pub fn ab_catalog() -> Catalog {
    Catalog::builder()
        .mol_type(MoleculeType::new("A", 100.0).with_binding_site("a1", ["free"], "free"))
        .mol_type(MoleculeType::new("B", 50.0).with_binding_site("b1", ["free"], "free"))
        .build()
        .unwrap()
}

/// A single type `A` with two sites `a1` and `a2`.
pub fn chain_catalog() -> Catalog {
    Catalog::builder()
        .mol_type(MoleculeType::new("A", 10.0).with_site("a1").with_site("a2"))
        .build()
        .unwrap()
}

/// A kinase `K`, a substrate `S` with a phosphorylation site, and the small molecules
/// `ATP`/`ADP`.
pub fn kinase_catalog() -> Catalog {
    Catalog::builder()
        .modification("none", 0.0)
        .modification("phos", 80.0)
        .mol_type(MoleculeType::new("K", 300.0).with_site("k"))
        .mol_type(
            MoleculeType::new("S", 200.0)
                .with_site("s")
                .with_mod_site("p", "none"),
        )
        .mol_type(MoleculeType::new("ATP", 507.0))
        .mol_type(MoleculeType::new("ADP", 427.0))
        .build()
        .unwrap()
}

/// Four types with a mix of site counts, for random complexes.
pub fn mixed_catalog() -> Catalog {
    Catalog::builder()
        .mol_type(
            MoleculeType::new("A", 1.0)
                .with_site("x")
                .with_site("y")
                .with_site("z"),
        )
        .mol_type(MoleculeType::new("B", 1.0).with_site("x").with_site("y"))
        .mol_type(
            MoleculeType::new("C", 1.0)
                .with_site("x")
                .with_site("y")
                .with_site("z")
                .with_site("w"),
        )
        .mol_type(MoleculeType::new("D", 1.0).with_site("x").with_site("y"))
        .build()
        .unwrap()
}

pub fn single(catalog: &Catalog, mol_type: &str) -> Plex {
    let mut builder = PlexBuilder::new(catalog);
    builder.add_mol(mol_type).unwrap();
    builder.build().unwrap()
}

/// Builds a complex from mol type names and `(mol, site, mol, site)` bindings.
pub fn plex(catalog: &Catalog, mols: &[&str], bindings: &[(usize, &str, usize, &str)]) -> Plex {
    let mut builder = PlexBuilder::new(catalog);
    for m in mols {
        builder.add_mol(m).unwrap();
    }
    for (lm, ls, rm, rs) in bindings {
        builder.bind(*lm, ls, *rm, rs).unwrap();
    }
    builder.build().unwrap()
}

/// A linear chain of `n` `A`s of [`chain_catalog`], each `a2` bound to the next `a1`.
pub fn chain(catalog: &Catalog, n: usize) -> Plex {
    let mols = vec!["A"; n];
    let bindings: Vec<_> = (1..n).map(|i| (i - 1, "a2", i, "a1")).collect();
    plex(catalog, &mols, &bindings)
}

/// Same complex with the mol order reversed.
pub fn reversed(plex: &Plex) -> Plex {
    let n = plex.mol_count();
    let mols = plex.mols().iter().rev().copied().collect();
    let bindings = plex
        .bindings()
        .iter()
        .map(|b| {
            Binding::new(
                SiteSpec::new(n - 1 - b.left.mol, b.left.site),
                SiteSpec::new(n - 1 - b.right.mol, b.right.site),
            )
        })
        .collect();
    Plex::from_parts(mols, bindings)
}

/// Multiset of `(species, count)` pairs, for comparing reaction sides.
pub fn side(entries: &[(SpeciesId, u32)]) -> std::collections::BTreeMap<SpeciesId, u32> {
    entries.iter().copied().collect()
}
