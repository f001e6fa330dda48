//! Write path benchmarks
//!
//! Compares appends while rotation is disabled (shared lock) against appends
//! once a limit is set (exclusive lock), single-threaded and contended.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quill_log::{LineFormat, RotatingFileWriter};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const RECORD: &[u8] = b"[INF] benchmark record with a typical payload length\r\n";

fn open_writer(dir: &TempDir, rotation: bool) -> RotatingFileWriter {
    let writer = RotatingFileWriter::open(dir.path().join("bench.log"), LineFormat::new()).unwrap();
    if rotation {
        writer.set_limit(64 * 1024 * 1024);
    }
    writer
}

/// Benchmark a single writer on each path
fn bench_single_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_writer");

    for (name, rotation) in [("fast_path", false), ("guarded_path", true)] {
        let dir = TempDir::new().unwrap();
        let writer = open_writer(&dir, rotation);

        group.bench_function(name, |b| {
            b.iter(|| writer.write(black_box(RECORD)).unwrap())
        });
    }

    group.finish();
}

/// Benchmark contended writers
fn bench_contended_writers(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_writers");

    for threads in [2usize, 4, 8] {
        for (name, rotation) in [("fast_path", false), ("guarded_path", true)] {
            let dir = TempDir::new().unwrap();
            let writer = Arc::new(open_writer(&dir, rotation));

            group.bench_with_input(BenchmarkId::new(name, threads), &threads, |b, &threads| {
                b.iter(|| {
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let writer = Arc::clone(&writer);
                            thread::spawn(move || {
                                for _ in 0..100 {
                                    writer.write(RECORD).unwrap();
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            });
        }
    }

    group.finish();
}

/// Benchmark rotation itself with a small limit
fn bench_rotation(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let writer = open_writer(&dir, false);
    writer.set_limit(RECORD.len() as u64);
    writer.set_max_backups(4);

    c.bench_function("rotate_and_purge", |b| {
        b.iter(|| writer.write(black_box(RECORD)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_single_writer,
    bench_contended_writers,
    bench_rotation
);
criterion_main!(benches);
