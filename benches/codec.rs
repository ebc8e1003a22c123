use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stout::{format_counter, format_gauge_delta, format_histogram, parse};

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.bench_function("counter", |b| {
        b.iter(|| parse(black_box(b"some.long.metric.name:1234|c")));
    });
    group.bench_function("histogram", |b| {
        b.iter(|| parse(black_box(b"some.long.metric.name:1234|ms")));
    });
    group.bench_function("gauge_delta", |b| {
        b.iter(|| parse(black_box(b"some.long.metric.name:-1234|g")));
    });
    group.bench_function("malformed", |b| {
        b.iter(|| parse(black_box(b"no delimiters in sight")));
    });
    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("format");
    group.bench_function("counter", |b| {
        b.iter(|| format_counter(black_box("some.long.metric.name"), black_box(1234)));
    });
    group.bench_function("histogram", |b| {
        b.iter(|| format_histogram(black_box("some.long.metric.name"), black_box(1234)));
    });
    group.bench_function("gauge_delta", |b| {
        b.iter(|| format_gauge_delta(black_box("some.long.metric.name"), black_box(-1234)));
    });
    group.finish();
}

criterion_group!(benches, bench_parse, bench_format);
criterion_main!(benches);
