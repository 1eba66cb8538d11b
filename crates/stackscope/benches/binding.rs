use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

#[inline(never)]
fn interpose(depth: usize, f: &mut dyn FnMut()) {
    if depth > 0 {
        interpose(depth - 1, f);
        black_box(());
        return;
    }
    f();
}

fn bench_scope_entry(c: &mut Criterion) {
    c.bench_function("with_binding_empty", |b| {
        b.iter(|| {
            stackscope::with_binding(black_box(1234u64), || {});
        });
    });
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    group.bench_function("inside_scope", |b| {
        stackscope::with_binding(1234u64, || {
            b.iter(|| black_box(stackscope::binding::<u64>()));
        });
    });

    group.bench_function("no_scope", |b| {
        b.iter(|| black_box(stackscope::binding::<u64>()));
    });

    group.bench_function("entry_plus_lookup", |b| {
        b.iter(|| {
            stackscope::with_binding(black_box(1234u64), || {
                black_box(stackscope::binding::<u64>());
            });
        });
    });

    group.finish();
}

// Lookup cost grows with the number of frames above the scope boundary.
fn bench_deep_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_stack_lookup");
    for depth in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            stackscope::with_binding(1234u64, || {
                interpose(depth, &mut || {
                    b.iter(|| black_box(stackscope::binding::<u64>()));
                });
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_scope_entry,
    bench_lookup,
    bench_deep_stack
);
criterion_main!(benches);
