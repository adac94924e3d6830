use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fdd::index::{GeneralIndex, Key, SortedIndex};

fn bench_general_index(c: &mut Criterion) {
    let mut idx: GeneralIndex<Key> = GeneralIndex::new(6, 2);
    for i in 0..10_000u64 {
        idx.insert_new(Key::Int(i as i128), &[i, i + 1]).unwrap();
    }
    c.bench_function("general_index_get_hit", |b| {
        b.iter(|| idx.get(black_box(&Key::Int(5_000))).unwrap().to_vec())
    });
    c.bench_function("general_index_get_miss", |b| {
        b.iter(|| idx.get(black_box(&Key::Int(-1))))
    });
}

fn bench_sorted_index(c: &mut Criterion) {
    let entries: Vec<(Key, Vec<u64>)> =
        (0..10_000u64).map(|i| (Key::Int(i as i128), vec![i, i + 1])).collect();
    let idx = SortedIndex::build(6, 2, entries);
    c.bench_function("sorted_index_binary_search", |b| {
        b.iter(|| idx.get(black_box(&Key::Int(5_000))).unwrap().to_vec())
    });
}

criterion_group!(benches, bench_general_index, bench_sorted_index);
criterion_main!(benches);
