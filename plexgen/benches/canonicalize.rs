use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use plexgen::mol::{Catalog, MoleculeType};
use plexgen::plex::canon::canonicalize;
use plexgen::plex::iso::is_isomorphic;
use plexgen::plex::{Binding, Plex, SiteSpec};

fn catalog() -> Catalog {
    Catalog::builder()
        .mol_type(MoleculeType::new("A", 1.0).with_site("a1").with_site("a2"))
        .build()
        .unwrap()
}

/// Ring of `n` identical mols. Every mol is equivalent, so canonicalization has to try
/// each of them as the first individualized mol.
fn ring(catalog: &Catalog, n: usize) -> Plex {
    let a = catalog.id_of("A").unwrap();
    let bindings = (0..n)
        .map(|i| Binding::new(SiteSpec::new(i, 1), SiteSpec::new((i + 1) % n, 0)))
        .collect();
    Plex::from_parts(vec![a; n], bindings)
}

/// The same ring with its mols numbered in a scrambled order.
fn scrambled_ring(catalog: &Catalog, n: usize) -> Plex {
    let a = catalog.id_of("A").unwrap();
    let relabel = |i: usize| (i * 7 + 3) % n;
    let bindings = (0..n)
        .map(|i| {
            Binding::new(
                SiteSpec::new(relabel(i), 1),
                SiteSpec::new(relabel((i + 1) % n), 0),
            )
        })
        .collect();
    Plex::from_parts(vec![a; n], bindings)
}

fn bench_canonicalize(c: &mut Criterion) {
    let catalog = catalog();
    let mut group = c.benchmark_group("canonicalize_ring");
    for n in [4usize, 8, 16, 32] {
        let plex = ring(&catalog, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &plex, |b, plex| {
            b.iter(|| canonicalize(black_box(plex), &catalog))
        });
    }
    group.finish();
}

fn bench_isomorphic(c: &mut Criterion) {
    let catalog = catalog();
    let mut group = c.benchmark_group("isomorphic_ring");
    // sizes coprime to 7 so the scramble is a permutation
    for n in [5usize, 9, 17, 33] {
        let left = ring(&catalog, n);
        let right = scrambled_ring(&catalog, n);
        group.bench_with_input(
            BenchmarkId::from_parameter(n),
            &(left, right),
            |b, (left, right)| {
                b.iter(|| is_isomorphic(&catalog, black_box(left), black_box(right)).unwrap())
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_canonicalize, bench_isomorphic);
criterion_main!(benches);
