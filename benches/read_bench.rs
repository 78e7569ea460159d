//! Benchmarks for shale read paths

use criterion::{criterion_group, criterion_main, Criterion};
use tempfile::TempDir;

use shale::segment::TableWriter;
use shale::{Config, CursorCache, ScanFilter, SegmentCatalog};

const KEYS_PER_SEGMENT: usize = 5_000;
const SEGMENTS: u64 = 4;

/// Build a store with overlapping key ranges across several generations
fn build_store(dir: &std::path::Path) {
    for gen in 1..=SEGMENTS {
        let path = dir.join(format!("{:06}.seg", gen));
        let mut writer = TableWriter::create(&path).unwrap();
        for i in 0..KEYS_PER_SEGMENT {
            let key = format!("key{:08}", i * SEGMENTS as usize + gen as usize % 2);
            let value = format!("value-{}-{}", gen, i);
            writer.add(key.as_bytes(), gen, value.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
}

fn read_benchmarks(c: &mut Criterion) {
    let temp = TempDir::new().unwrap();
    build_store(temp.path());
    let catalog = SegmentCatalog::open(temp.path(), Config::default()).unwrap();

    c.bench_function("point_lookup", |b| {
        let mut cache = CursorCache::new();
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("key{:08}", (i * 7919) % (KEYS_PER_SEGMENT * SEGMENTS as usize));
            i += 1;
            catalog.get(&mut cache, key.as_bytes()).unwrap()
        });
    });

    c.bench_function("batch_lookup_1000", |b| {
        let keys: Vec<Vec<u8>> = (0..1000)
            .map(|i| format!("key{:08}", i * 13 % (KEYS_PER_SEGMENT * SEGMENTS as usize)).into_bytes())
            .collect();
        let key_refs: Vec<&[u8]> = keys.iter().map(|k| k.as_slice()).collect();
        b.iter(|| catalog.batch_get(&key_refs).unwrap());
    });

    c.bench_function("merge_scan_full", |b| {
        b.iter(|| catalog.iter(ScanFilter::all()).unwrap().count());
    });
}

criterion_group!(benches, read_benchmarks);
criterion_main!(benches);
