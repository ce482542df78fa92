use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use kale_core::config::CheckConfig;
use kale_core::semantic::{check_unreachable, lower_function, reachable_blocks};
use kale_core::syntax::build::*;
use kale_core::syntax::SyntaxNode;
use kale_core::{Config, Severity, check_file};

/// A body mixing declarations, arithmetic, loops and branches.
fn generate_function(name: &str, statements: usize) -> SyntaxNode {
    let body = (0..statements)
        .map(|i| match i % 4 {
            0 => local(&format!("x{i}"), "int"),
            1 => while_loop(
                int(i as u64),
                block(vec![local(&format!("w{i}"), "int"), add(int(1), int(2))]),
            ),
            2 => if_else(
                mul(int(i as u64), int(3)),
                block(vec![local(&format!("t{i}"), "int")]),
                block(vec![sub(int(9), div(int(8), int(2)))]),
            ),
            _ => if_then(int(0), block(vec![ret(int(i as u64))])),
        })
        .collect();
    function(name, block(body))
}

fn generate_file(functions: usize, statements: usize) -> SyntaxNode {
    file(
        (0..functions)
            .map(|i| generate_function(&format!("f{i}"), statements))
            .collect(),
    )
}

fn bench_lowering(c: &mut Criterion) {
    let config = CheckConfig::default();
    let mut group = c.benchmark_group("lowering");

    for size in [10, 100, 1000] {
        let func = generate_function("bench", size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("statements", size), &func, |b, func| {
            b.iter(|| lower_function(black_box(func), &config))
        });
    }

    group.finish();
}

fn bench_reachability(c: &mut Criterion) {
    let mut group = c.benchmark_group("reachability");
    let func = lower_function(&generate_function("bench", 1000), &CheckConfig::default())
        .expect("generated function lowers");

    group.throughput(Throughput::Elements(func.block_count() as u64));
    group.bench_function("reachable_blocks", |b| {
        b.iter(|| reachable_blocks(black_box(&func)))
    });
    group.bench_function("check_unreachable", |b| {
        b.iter(|| check_unreachable(black_box(&func), Severity::Error))
    });

    group.finish();
}

fn bench_check_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_file");
    let root = generate_file(100, 50);
    let config = Config::default();

    group.throughput(Throughput::Elements(100));
    group.bench_function("100_functions", |b| {
        b.iter(|| check_file(black_box(&root), &config))
    });

    group.finish();
}

criterion_group!(benches, bench_lowering, bench_reachability, bench_check_file);
criterion_main!(benches);
