//! Latency benchmarks for the encode → score path
//!
//! The inference worker holds no lock while encoding or scoring, but it is
//! single-threaded, so per-event latency bounds queue throughput.
//!
//! Run with: cargo bench -p cybersafe-classifiers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cybersafe_classifiers::{FeatureEncoder, HashingEncoder, LinearRiskModel, RiskModel};
use cybersafe_core::RiskCategory;

const TEXTS: &[(&str, &str)] = &[
    ("short", "see you tomorrow"),
    ("medium", "you are terrible and everyone at school knows it, nobody wants you here"),
    ("long", "lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod tempor incididunt ut labore et dolore magna aliqua ut enim ad minim veniam quis nostrud exercitation ullamco laboris"),
];

fn benchmark_encoder(c: &mut Criterion) {
    let encoder = HashingEncoder::new(128, 4096).expect("valid encoder");

    let mut group = c.benchmark_group("Hashing_Encoder");
    for (name, text) in TEXTS {
        group.bench_with_input(BenchmarkId::new("encode", name), text, |b, text| {
            b.iter(|| encoder.encode(black_box(text)))
        });
    }
    group.finish();
}

fn benchmark_linear_models(c: &mut Criterion) {
    let encoder = HashingEncoder::new(128, 4096).expect("valid encoder");
    let models: Vec<LinearRiskModel> = RiskCategory::defaults()
        .into_iter()
        .enumerate()
        .map(|(i, category)| {
            let weights = (0..128).map(|j| ((i + j) % 7) as f32 * 0.1 - 0.3).collect();
            LinearRiskModel::from_weights(category, weights, 0.0).expect("valid model")
        })
        .collect();

    let mut group = c.benchmark_group("Encode_And_Score");
    for (name, text) in TEXTS {
        group.bench_with_input(BenchmarkId::new("three_models", name), text, |b, text| {
            b.iter(|| {
                let features = encoder.encode(black_box(text));
                models
                    .iter()
                    .map(|m| m.score(&features).expect("score"))
                    .sum::<f32>()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_encoder, benchmark_linear_models);
criterion_main!(benches);
