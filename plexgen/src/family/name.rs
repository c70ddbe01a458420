use super::PlexFamily;
use crate::mol::{Catalog, MolParam};

/// Builds the human-readable name of a species. Called at most once per species.
pub trait NameAssembler {
    fn assemble(&self, catalog: &Catalog, family: &PlexFamily, params: &[MolParam]) -> String;
}

/// Names a species by walking its paradigm in canonical order, e.g.
/// `A(phos).B[0.a1-1.b1]`.
///
/// Structurally identical complexes therefore get the same name no matter which mol
/// order they were built in.
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalNameAssembler;

impl NameAssembler for CanonicalNameAssembler {
    fn assemble(&self, catalog: &Catalog, family: &PlexFamily, params: &[MolParam]) -> String {
        let paradigm = family.paradigm();
        let order = &family.canonical_form().order;
        let positions = family.canonical_form().positions();

        let mols: Vec<String> = order
            .iter()
            .map(|&mol| {
                let mol_type = catalog.mol_type(paradigm.mol_type(mol));
                match params.get(mol) {
                    Some(p) if !p.state().mods.is_empty() => {
                        let mods: Vec<String> = p.state().mods.iter().map(|m| m.to_string()).collect();
                        format!("{}({})", mol_type.name, mods.join(","))
                    }
                    _ => mol_type.name.to_string(),
                }
            })
            .collect();

        let site_name = |mol: usize, site: usize| {
            catalog.mol_type(paradigm.mol_type(mol)).binding_sites[site]
                .name
                .to_string()
        };
        let mut bindings: Vec<(usize, String)> = paradigm
            .bindings()
            .iter()
            .map(|b| {
                let (l, r) = if positions[b.left.mol] <= positions[b.right.mol] {
                    (b.left, b.right)
                } else {
                    (b.right, b.left)
                };
                (
                    positions[l.mol],
                    format!(
                        "{}.{}-{}.{}",
                        positions[l.mol],
                        site_name(l.mol, l.site),
                        positions[r.mol],
                        site_name(r.mol, r.site)
                    ),
                )
            })
            .collect();
        bindings.sort();

        let mut name = mols.join(".");
        if !bindings.is_empty() {
            let rendered: Vec<String> = bindings.into_iter().map(|(_, s)| s).collect();
            name.push('[');
            name.push_str(&rendered.join(","));
            name.push(']');
        }
        name
    }
}
