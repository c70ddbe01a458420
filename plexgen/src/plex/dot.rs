use super::Plex;
use crate::mol::Catalog;
use petgraph::dot;
use petgraph::dot::Dot;
use petgraph::visit::EdgeRef;

impl Plex {
    /// Renders the complex as a Graphviz graph, labelling mols with their type and
    /// bindings with the two site names.
    pub fn dot(&self, catalog: &Catalog) -> String {
        let graph = self.as_graph();
        let site_name = |mol: usize, site: usize| {
            catalog
                .get(self.mol_type(mol))
                .and_then(|mt| mt.binding_sites.get(site))
                .map(|s| s.name.to_string())
                .unwrap_or_else(|| site.to_string())
        };
        format!(
            "{:?}",
            Dot::with_attr_getters(
                &graph,
                &[dot::Config::EdgeNoLabel, dot::Config::NodeNoLabel],
                &|_, edge| {
                    let binding = edge.weight();
                    let left = site_name(binding.left.mol, binding.left.site);
                    let right = site_name(binding.right.mol, binding.right.site);
                    format!("label = \"{left}-{right}\"")
                },
                &|_, (node, mol_type)| {
                    let name = catalog
                        .name_of(*mol_type)
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| format!("{mol_type:?}"));
                    let name = name.escape_debug();
                    format!("label = \"{}|{name}\"", node.index())
                }
            )
        )
    }
}

/// Concatenates the renderings of several complexes, e.g. the products of one expansion.
#[derive(Default)]
pub struct DotCollector {
    dot: String,
}

impl DotCollector {
    pub fn new() -> Self {
        DotCollector { dot: String::new() }
    }

    pub fn collect(&mut self, plex: &Plex, catalog: &Catalog) {
        if !self.dot.is_empty() {
            self.dot.push_str("\n---\n");
        }
        self.dot.push_str(&plex.dot(catalog));
    }

    pub fn finalize(&self) -> String {
        self.dot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mol::MoleculeType;
    use crate::plex::PlexBuilder;

    #[test_log::test]
    fn renders_types_and_sites() {
        let catalog = Catalog::builder()
            .mol_type(MoleculeType::new("A", 1.0).with_site("a1"))
            .mol_type(MoleculeType::new("B", 1.0).with_site("b1"))
            .build()
            .unwrap();
        let mut builder = PlexBuilder::new(&catalog);
        let a = builder.add_mol("A").unwrap();
        let b = builder.add_mol("B").unwrap();
        builder.bind(a, "a1", b, "b1").unwrap();
        let plex = builder.build().unwrap();

        let mut collector = DotCollector::new();
        collector.collect(&plex, &catalog);
        collector.collect(&plex, &catalog);
        let out = collector.finalize();
        assert!(out.contains("label = \"0|A\""));
        assert!(out.contains("label = \"a1-b1\""));
        assert_eq!(out.matches("---").count(), 1);
    }
}
