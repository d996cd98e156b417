//! Diagnostic service benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use erbind_bench::BenchRepository;
use erbind_core::DiagnosticService;

fn ready_service(repo: &BenchRepository) -> DiagnosticService {
    let service = DiagnosticService::new();
    service.init(&repo.session_config()).unwrap();
    service
}

/// Benchmark draining entity lists over repositories of growing size.
fn bench_entity_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagnostic/entity_list");

    for entities in [100i64, 1_000, 5_000] {
        let repo = BenchRepository::populated(entities, 4);
        let service = ready_service(&repo);

        group.throughput(Throughput::Elements(entities as u64));
        group.bench_with_input(BenchmarkId::new("drain", entities), &service, |b, s| {
            b.iter(|| {
                let handle = s.get_entity_list_by_size(1).unwrap();
                while let Some(row) = s.fetch_next_entity_by_size(handle).unwrap() {
                    black_box(row);
                }
                s.close_entity_list_by_size(handle).unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("iterator", entities), &service, |b, s| {
            b.iter(|| {
                for row in s.entities_by_size(2).unwrap() {
                    black_box(row.unwrap());
                }
            });
        });
    }
    group.finish();
}

/// Benchmark repository-wide queries.
fn bench_repository_queries(c: &mut Criterion) {
    let repo = BenchRepository::populated(1_000, 4);
    let service = ready_service(&repo);
    let mut group = c.benchmark_group("diagnostic/query");

    group.bench_function("db_info", |b| {
        b.iter(|| black_box(service.get_db_info().unwrap()));
    });
    group.bench_function("resolution_statistics", |b| {
        b.iter(|| black_box(service.get_resolution_statistics().unwrap()));
    });
    group.bench_function("entity_details", |b| {
        b.iter(|| black_box(service.get_entity_details(black_box(500), true).unwrap()));
    });
    group.bench_function("physical_cores", |b| {
        b.iter(|| black_box(service.get_physical_cores().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_entity_list, bench_repository_queries);

criterion_main!(benches);
