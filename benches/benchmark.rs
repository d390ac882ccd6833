use std::collections::HashMap;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tf_idf_profiler::{EngineConfig, ProfileUpdateEngine, RecipientId, Tokenizer};

const WORDS: &[&str] = &[
    "rust", "borrow", "checker", "lifetime", "trait", "async", "tokio", "serde", "macro", "crate",
    "cargo", "unsafe", "pointer", "thread", "mutex", "channel", "iterator", "closure", "generic",
    "compile", "memory", "allocator", "vector", "slice", "string", "parser", "network", "socket",
];

/// Deterministic pseudo-random post body
fn post(seed: u64, len: usize) -> String {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut body = String::from("<p>");
    for _ in 0..len {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        body.push_str(WORDS[(state % WORDS.len() as u64) as usize]);
        body.push(' ');
    }
    body.push_str("</p>");
    body
}

fn share_batch(recipients: usize, offset: u64) -> (Vec<RecipientId>, HashMap<RecipientId, String>) {
    let ids: Vec<RecipientId> = (0..recipients)
        .map(|i| RecipientId::from(format!("user{i}@example.org")))
        .collect();
    let content = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), post(offset + i as u64, 400)))
        .collect();
    (ids, content)
}

fn update_batch_benchmark(c: &mut Criterion) {
    let tokenizer = Tokenizer::default();
    let body = post(7, 2_000);
    c.bench_function("tokenize_post", |b| b.iter(|| tokenizer.tokenize(&body)));

    c.bench_function("update_batch_32_recipients", |b| {
        b.iter_batched(
            || {
                let engine = ProfileUpdateEngine::in_memory(EngineConfig::default()).unwrap();
                // 既存プロファイルを用意しておく
                for round in 0..4 {
                    let (ids, content) = share_batch(256, round * 1_000);
                    engine.update_batch(&ids, &content).unwrap();
                }
                (engine, share_batch(32, 99_000))
            },
            |(engine, (ids, content))| engine.update_batch(&ids, &content).unwrap(),
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, update_batch_benchmark);
criterion_main!(benches);
