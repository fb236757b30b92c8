//! Benchmarks for response recovery
//!
//! This benchmark measures:
//! - Clean parse of prose-wrapped JSON
//! - Repair path (fences, trailing commas, bare keys, truncation)
//! - Synthesis fallback from fragments

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ai_gateway::structured::{ExpectedShape, ResponseRecoverer};

const CLEAN: &str = r#"Here you go: {"title": "Fractions", "description": "Intro", "content": "A fraction is part of a whole.", "objectives": ["halves"], "exercises": []}"#;

const REPAIRABLE: &str = "```json\n{title: \"Fractions\", description: \"Intro\",\n content: \"A fraction is part of a whole.\",\n objectives: [\"halves\", \"thirds\",],\n exercises: [{question: \"1/2 of 4?\", answer: \"2\"},],\n";

const SYNTHESIZED: &str = r#"The model ran out of time. "title": "Fractions", "description": "Intro", then nothing useful"#;

fn bench_recover(c: &mut Criterion) {
    let recoverer = ResponseRecoverer::new();
    let shape = ExpectedShape::lesson();

    let mut group = c.benchmark_group("recover");
    for (name, raw) in [("clean", CLEAN), ("repaired", REPAIRABLE), ("synthesized", SYNTHESIZED)] {
        group.bench_with_input(BenchmarkId::new("lesson", name), raw, |b, raw| {
            b.iter(|| recoverer.recover(black_box(raw), &shape))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_recover);
criterion_main!(benches);
