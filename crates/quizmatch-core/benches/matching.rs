use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quizmatch_core::matcher::{MatchConfig, Matcher};
use quizmatch_core::model::{OptionLabel, WideQuestion};
use quizmatch_core::text::{normalize, similarity};

fn generate_questions(n: usize) -> Vec<WideQuestion> {
    (0..n)
        .map(|i| WideQuestion {
            question_id: format!("{}", 1000 + i),
            question_text: format!(
                "Question {i}: which of the following statements about topic {} is correct?",
                i * 7
            ),
            options: (0..4).map(|o| format!("Statement {o} for topic {i}")).collect(),
            correct_label: OptionLabel::from_index(i % 4).unwrap(),
        })
        .collect()
}

fn bench_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("similarity");

    let short_a = normalize("What is the capital of France?");
    let short_b = normalize("What's the capital city of France");
    let long_a = normalize(&"The mitochondria is the powerhouse of the cell. ".repeat(10));
    let long_b = normalize(&"Mitochondria are the powerhouses of cells. ".repeat(10));

    group.bench_function("short", |b| {
        b.iter(|| similarity(black_box(&short_a), black_box(&short_b)))
    });

    group.bench_function("long", |b| {
        b.iter(|| similarity(black_box(&long_a), black_box(&long_b)))
    });

    group.finish();
}

fn bench_best_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_match");

    for size in [10, 100, 500] {
        let questions = generate_questions(size);
        let matcher = Matcher::new(&questions, MatchConfig::default());
        let query = format!(
            "which of the following statements about topic {} is correct",
            (size / 2) * 7
        );

        group.bench_function(format!("{size}_candidates"), |b| {
            b.iter(|| matcher.best_match(black_box(&query)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_similarity, bench_best_match);
criterion_main!(benches);
