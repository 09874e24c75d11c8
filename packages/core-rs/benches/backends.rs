use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use densemat_core::{ComputedEngine, Engine, HybridEngine, Matrix, NativeEngine};

const SIZES: [usize; 4] = [4, 8, 16, 64];

fn square(n: usize, phase: f64) -> Matrix {
    let data: Vec<f64> = (0..n * n).map(|i| (i as f64 * 0.37 + phase).sin()).collect();
    let mut a = Matrix::from_column_major(n, n, data).expect("square");
    for i in 0..n {
        a.add(i, i, n as f64);
    }
    a
}

fn engines() -> Vec<(&'static str, Box<dyn Engine>)> {
    vec![
        ("computed", Box::new(ComputedEngine)),
        ("native", Box::new(NativeEngine::new())),
        ("hybrid", Box::new(HybridEngine::new())),
    ]
}

fn bench_multiply(c: &mut Criterion) {
    let mut group = c.benchmark_group("multiply");
    for n in SIZES {
        let a = square(n, 0.0);
        let b = square(n, 1.0);
        for (label, engine) in engines() {
            group.bench_with_input(BenchmarkId::new(label, n), &n, |bch, _| {
                bch.iter(|| Matrix::multiply(engine.as_ref(), black_box(&a), black_box(&b)).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_invert(c: &mut Criterion) {
    let mut group = c.benchmark_group("invert");
    for n in SIZES {
        let a = square(n, 0.5);
        for (label, engine) in engines() {
            group.bench_with_input(BenchmarkId::new(label, n), &n, |bch, _| {
                bch.iter(|| engine.invert(black_box(&a)).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_svd(c: &mut Criterion) {
    let mut group = c.benchmark_group("svd");
    for n in SIZES {
        let a = square(n, 2.0);
        for (label, engine) in engines() {
            group.bench_with_input(BenchmarkId::new(label, n), &n, |bch, _| {
                bch.iter(|| engine.decompose_svd(black_box(&a)).unwrap())
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_multiply, bench_invert, bench_svd);
criterion_main!(benches);
