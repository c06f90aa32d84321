use apispec_core::pool::StringPool;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn intern_repeat(c: &mut Criterion) {
    let pool = StringPool::new();
    let names = [
        "github.com/gin-gonic/gin",
        "net/http",
        "encoding/json",
        "github.com/go-chi/chi/v5",
    ];

    c.bench_function("intern_repeat", |b| {
        b.iter(|| {
            for name in names.iter() {
                black_box(pool.intern(name));
            }
        })
    });
}

fn intern_fresh(c: &mut Criterion) {
    c.bench_function("intern_fresh", |b| {
        b.iter(|| {
            let pool = StringPool::new();
            for i in 0..1000 {
                black_box(pool.intern(&format!("pkg/mod{i}")));
            }
        })
    });
}

criterion_group!(benches, intern_repeat, intern_fresh);
criterion_main!(benches);
