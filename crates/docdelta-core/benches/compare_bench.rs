//! Comparison and revision processing on generated documents.
//!
//! Run with: cargo bench --bench compare_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docdelta_core::xml::namespaces::W;
use docdelta_core::{accept_revisions, WmlComparer, WmlComparerSettings, WmlDocument};

const WORDS: &[&str] = &[
    "contract", "party", "shall", "deliver", "goods", "within", "thirty", "days", "of", "notice",
];

/// `count` paragraphs of twelve words; every `edit_every`th paragraph
/// has one word swapped when `edited` is set.
fn generate(count: usize, edit_every: usize, edited: bool) -> WmlDocument {
    let body: String = (0..count)
        .map(|p| {
            let text: Vec<&str> = (0..12)
                .map(|w| {
                    if edited && p % edit_every == 0 && w == 5 {
                        "revised"
                    } else {
                        WORDS[(p * 7 + w) % WORDS.len()]
                    }
                })
                .collect();
            format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text.join(" "))
        })
        .collect();
    WmlDocument::from_main_xml(&format!(
        r#"<w:document xmlns:w="{}"><w:body>{}</w:body></w:document>"#,
        W::NS,
        body
    ))
    .expect("generated document")
}

fn compare_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("wml_compare");
    group.sample_size(10);
    let settings = WmlComparerSettings::default()
        .with_author("Bench")
        .with_date_time("2024-01-01T00:00:00Z");

    for count in [20usize, 100, 400] {
        let original = generate(count, 5, false);
        let revised = generate(count, 5, true);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("paragraphs", count), &count, |b, _| {
            b.iter(|| WmlComparer::compare(black_box(&original), black_box(&revised), Some(&settings)).unwrap())
        });
    }
    group.finish();
}

fn accept_benchmark(c: &mut Criterion) {
    let original = generate(200, 3, false);
    let revised = generate(200, 3, true);
    let marked = WmlComparer::compare(&original, &revised, None)
        .expect("compare")
        .document;

    c.bench_function("wml_accept_200", |b| {
        b.iter(|| accept_revisions(black_box(&marked)).unwrap())
    });
}

criterion_group!(benches, compare_benchmark, accept_benchmark);
criterion_main!(benches);
