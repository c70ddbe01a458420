//! Canonical labeling of complexes.
//!
//! Mols start out colored by molecule type name. The coloring is refined by the
//! (site, neighbour site, neighbour color) signatures of each mol until it is stable, and
//! any remaining ties are broken by individualizing each candidate of the first
//! non-singleton cell in turn. Every discrete labeling reached this way is encoded and the
//! smallest encoding wins.
//!
//! Each site takes part in at most one binding, so within a connected complex a single
//! individualized mol already orders all of its neighbours. The search tree therefore
//! stays at most as wide as the complex is large. Disconnected complexes are labeled one
//! connected component at a time, and the component labelings are laid out one after the
//! other in encoding order.

use super::{Binding, Plex};
use crate::mol::{Catalog, MolTypeId, MolTypeName};
use crate::util::log;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Run lengths of molecule type names in sorted mol order.
///
/// Isomorphic complexes always have the same signature, so comparing signatures is a
/// cheap way to rule out most non-isomorphic pairs.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PartitionSignature(pub Vec<(MolTypeName, usize)>);

impl PartitionSignature {
    pub fn of(plex: &Plex, catalog: &Catalog) -> Self {
        let mut runs: Vec<(MolTypeName, usize)> = Vec::new();
        let mols: Vec<usize> = (0..plex.mol_count()).collect();
        for cell in initial_partition(plex, catalog, &mols) {
            let name = catalog.mol_type(plex.mol_type(cell[0])).name;
            runs.push((name, cell.len()));
        }
        PartitionSignature(runs)
    }
}

/// A labeling-independent encoding of a complex. Two complexes are isomorphic exactly
/// when their encodings are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CanonicalEncoding {
    /// Mol types in canonical position order.
    mols: Vec<MolTypeId>,
    /// `[position, site, position, site]`, each binding written smaller end first, sorted.
    bindings: Vec<[usize; 4]>,
}

impl CanonicalEncoding {
    pub fn mol_count(&self) -> usize {
        self.mols.len()
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CanonicalForm {
    pub encoding: CanonicalEncoding,
    /// Canonical position to mol index.
    pub order: Vec<usize>,
}

impl CanonicalForm {
    /// Mol index to canonical position.
    pub fn positions(&self) -> Vec<usize> {
        let mut pos = vec![0; self.order.len()];
        for (p, &mol) in self.order.iter().enumerate() {
            pos[mol] = p;
        }
        pos
    }
}

type Partition = Vec<Vec<usize>>;

/// For each mol: `(own site, neighbour mol, neighbour site)`.
type Adjacency = Vec<Vec<(usize, usize, usize)>>;

fn initial_partition(plex: &Plex, catalog: &Catalog, mols: &[usize]) -> Partition {
    let mut mols = mols.to_vec();
    let name = |mol: usize| catalog.mol_type(plex.mol_type(mol)).name;
    mols.sort_by_key(|&m| name(m));
    let mut partition: Partition = Vec::new();
    for mol in mols {
        match partition.last_mut() {
            Some(cell) if name(cell[0]) == name(mol) => cell.push(mol),
            _ => partition.push(vec![mol]),
        }
    }
    partition
}

fn adjacency(plex: &Plex) -> Adjacency {
    let mut adj = vec![Vec::new(); plex.mol_count()];
    for b in plex.bindings() {
        adj[b.left.mol].push((b.left.site, b.right.mol, b.right.site));
        adj[b.right.mol].push((b.right.site, b.left.mol, b.left.site));
    }
    adj
}

/// Connected components, each listed from its smallest mol.
fn components(adj: &Adjacency) -> Vec<Vec<usize>> {
    let mut seen = vec![false; adj.len()];
    let mut components = Vec::new();
    for start in 0..adj.len() {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut component = vec![start];
        let mut next = 0;
        while let Some(&mol) = component.get(next) {
            next += 1;
            for &(_, nbr, _) in &adj[mol] {
                if !seen[nbr] {
                    seen[nbr] = true;
                    component.push(nbr);
                }
            }
        }
        components.push(component);
    }
    components
}

fn refine(mut partition: Partition, adj: &Adjacency) -> Partition {
    loop {
        let mut cell_of = vec![0; adj.len()];
        for (c, cell) in partition.iter().enumerate() {
            for &mol in cell {
                cell_of[mol] = c;
            }
        }
        let signature = |mol: usize| {
            let mut sig: Vec<(usize, usize, usize)> = adj[mol]
                .iter()
                .map(|&(own, nbr, nbr_site)| (own, nbr_site, cell_of[nbr]))
                .collect();
            sig.sort_unstable();
            sig
        };

        let mut next: Partition = Vec::with_capacity(partition.len());
        let mut split = false;
        for cell in &partition {
            if cell.len() == 1 {
                next.push(cell.clone());
                continue;
            }
            let mut keyed: Vec<_> = cell.iter().map(|&m| (signature(m), m)).collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            let first = next.len();
            for (i, (sig, mol)) in keyed.iter().enumerate() {
                if i > 0 && keyed[i - 1].0 == *sig {
                    if let Some(last) = next.last_mut() {
                        last.push(*mol);
                    }
                } else {
                    next.push(vec![*mol]);
                }
            }
            split |= next.len() - first > 1;
        }
        partition = next;
        if !split {
            return partition;
        }
    }
}

/// Encodes one connected component. Positions count from zero within the component.
fn encode(plex: &Plex, bindings: &[Binding], partition: &Partition) -> (CanonicalEncoding, Vec<usize>) {
    let order: Vec<usize> = partition.iter().map(|cell| cell[0]).collect();
    let mut pos = vec![0; plex.mol_count()];
    for (p, &mol) in order.iter().enumerate() {
        pos[mol] = p;
    }
    let mut bindings: Vec<[usize; 4]> = bindings
        .iter()
        .map(|b| {
            let l = (pos[b.left.mol], b.left.site);
            let r = (pos[b.right.mol], b.right.site);
            let (lo, hi) = if l <= r { (l, r) } else { (r, l) };
            [lo.0, lo.1, hi.0, hi.1]
        })
        .collect();
    bindings.sort_unstable();
    let encoding = CanonicalEncoding {
        mols: order.iter().map(|&m| plex.mol_type(m)).collect(),
        bindings,
    };
    (encoding, order)
}

struct Search<'a> {
    plex: &'a Plex,
    adj: &'a Adjacency,
    bindings: Vec<Binding>,
    best: Option<(CanonicalEncoding, Vec<usize>)>,
    leaves: usize,
}

impl Search<'_> {
    fn run(&mut self, partition: Partition) {
        let partition = refine(partition, self.adj);
        match partition.iter().position(|cell| cell.len() > 1) {
            None => {
                self.leaves += 1;
                let (encoding, order) = encode(self.plex, &self.bindings, &partition);
                let better = match &self.best {
                    Some((best, _)) => encoding < *best,
                    None => true,
                };
                if better {
                    self.best = Some((encoding, order));
                }
            }
            Some(target) => {
                for &chosen in &partition[target] {
                    let rest: Vec<usize> = partition[target]
                        .iter()
                        .copied()
                        .filter(|&m| m != chosen)
                        .collect();
                    let mut child = partition.clone();
                    child.splice(target..=target, [vec![chosen], rest]);
                    self.run(child);
                }
            }
        }
    }
}

/// Computes the canonical form of `plex`. The result depends only on the isomorphism
/// class of `plex`, not on its mol order or binding order.
pub fn canonicalize(plex: &Plex, catalog: &Catalog) -> CanonicalForm {
    let adj = adjacency(plex);
    let mut leaves = 0;
    let components = components(&adj);
    let mut component_of = vec![0; plex.mol_count()];
    for (c, component) in components.iter().enumerate() {
        for &mol in component {
            component_of[mol] = c;
        }
    }
    let mut bindings: Vec<Vec<Binding>> = vec![Vec::new(); components.len()];
    for b in plex.bindings() {
        bindings[component_of[b.left.mol]].push(*b);
    }

    let mut pieces: Vec<(CanonicalEncoding, Vec<usize>)> = Vec::new();
    for (component, bindings) in components.into_iter().zip(bindings) {
        let mut search = Search {
            plex,
            adj: &adj,
            bindings,
            best: None,
            leaves: 0,
        };
        search.run(initial_partition(plex, catalog, &component));
        leaves += search.leaves;
        pieces.extend(search.best);
    }
    pieces.sort_by(|a, b| a.0.cmp(&b.0));
    log::trace!(
        "canonicalized complex with {} mols in {} components after {leaves} leaves",
        plex.mol_count(),
        pieces.len()
    );

    let mut encoding = CanonicalEncoding {
        mols: Vec::with_capacity(plex.mol_count()),
        bindings: Vec::with_capacity(plex.binding_count()),
    };
    let mut order = Vec::with_capacity(plex.mol_count());
    for (piece, piece_order) in pieces {
        let offset = encoding.mols.len();
        encoding.mols.extend(piece.mols);
        encoding.bindings.extend(
            piece
                .bindings
                .into_iter()
                .map(|[p, s, q, t]| [p + offset, s, q + offset, t]),
        );
        order.extend(piece_order);
    }
    CanonicalForm { encoding, order }
}
