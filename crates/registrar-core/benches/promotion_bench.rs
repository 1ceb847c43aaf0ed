//! # Promotion Benchmarks
//!
//! Performance benchmarks for enrollment and bulk promotion.
//!
//! Run with: `cargo bench -p registrar-core`

use chrono::NaiveDate;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use registrar_core::{EnrollRequest, PromotionRequest, Registry, Semester};
use std::hint::black_box;

/// Create a registry with one study and `size` students in semester 1.
fn create_cohort(size: usize) -> Registry {
    let registry = Registry::new();
    registry.add_study("CS").expect("study");
    for i in 0..size {
        registry
            .enroll(&EnrollRequest {
                index_number: format!("s{:06}", i),
                first_name: "First".to_string(),
                last_name: "Last".to_string(),
                birth_date: NaiveDate::from_ymd_opt(2000, 1, 1),
                study_name: "CS".to_string(),
            })
            .expect("enroll");
    }
    registry
}

fn request(old: u32, new: u32) -> PromotionRequest {
    PromotionRequest {
        study_name: "CS".to_string(),
        old_semester: Semester::new(old),
        new_semester: Semester::new(new),
    }
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_enroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("enroll");

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| black_box(create_cohort(size)));
        });
    }

    group.finish();
}

fn bench_promote(c: &mut Criterion) {
    let mut group = c.benchmark_group("promote");

    for size in [100, 1000, 5000].iter() {
        let registry = create_cohort(*size);
        // Alternate direction so every iteration moves the whole cohort.
        let mut upward = true;

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let req = if upward { request(1, 2) } else { request(2, 1) };
                upward = !upward;
                black_box(registry.promote(&req).expect("promote"))
            });
        });
    }

    group.finish();
}

fn bench_list_students(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_students");

    for size in [100, 1000].iter() {
        let registry = create_cohort(*size);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(registry.list_students().expect("list")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enroll, bench_promote, bench_list_students);

criterion_main!(benches);
