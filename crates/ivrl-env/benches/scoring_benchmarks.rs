//! Scoring Benchmarks
//!
//! Hot paths run once per sampled completion:
//! 1. AnswerExtractor::extract() - tag and answer matching
//! 2. score_completion() - extraction plus reward shaping
//! 3. ChatTemplate::render() - prompt rendering per request

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ivrl_core::item::IMPLIED_VOLATILITY_METRIC;
use ivrl_core::{MarketRecord, OptionType};
use ivrl_env::prompt::build_prompt;
use ivrl_env::scoring::score_completion;
use ivrl_env::{AnswerExtractor, ChatTemplate};

fn completion(reasoning_words: usize) -> String {
    let reasoning = "the skew steepens near expiry ".repeat(reasoning_words / 5 + 1);
    format!("<think>{reasoning}</think>\nThe implied volatility will be: 31.5%")
}

fn bench_extract(c: &mut Criterion) {
    let extractor = AnswerExtractor::new(IMPLIED_VOLATILITY_METRIC).unwrap();
    let mut group = c.benchmark_group("extract");

    for words in [50, 500, 5000] {
        let text = completion(words);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(words), &text, |b, text| {
            b.iter(|| extractor.extract(black_box(text)));
        });
    }

    group.finish();
}

fn bench_score(c: &mut Criterion) {
    let extractor = AnswerExtractor::new(IMPLIED_VOLATILITY_METRIC).unwrap();
    let good = completion(500);
    let bad = "I would guess roughly thirty percent.".repeat(20);

    c.bench_function("score_completion/well_formed", |b| {
        b.iter(|| score_completion(&extractor, black_box(&good), "30.2", 600, 16384));
    });
    c.bench_function("score_completion/malformed", |b| {
        b.iter(|| score_completion(&extractor, black_box(&bad), "30.2", 600, 16384));
    });
}

fn bench_render(c: &mut Criterion) {
    let record = MarketRecord {
        last_price: 12.5,
        underlying_price: 510.2,
        strike: 500.0,
        expiration_date: "2031-01-17".to_string(),
        implied_volatility: 0.2512,
        option_type: OptionType::Call,
        risk_free_rate: None,
        context: None,
    };
    let now = Utc.with_ymd_and_hms(2030, 1, 17, 0, 0, 0).unwrap();
    let messages = build_prompt(&record, now);

    c.bench_function("render/llama3", |b| {
        b.iter(|| ChatTemplate::Llama3.render(black_box(&messages), true));
    });
}

criterion_group!(benches, bench_extract, bench_score, bench_render);
criterion_main!(benches);
