use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use doc_chunker::{chunk_document, ChunkerConfig, PageInput};

// Generate a single page of prose with the occasional figure/table
// placeholder, roughly `word_count` words long.
fn generate_page(page_num: usize, word_count: usize) -> PageInput {
    let mut text = format!(r#"<!--PageHeader="Section {page_num}"-->"#);
    let mut words_written = 0;
    let mut paragraph = 0;
    while words_written < word_count {
        text.push_str(&format!("## Subsection {paragraph}\n\n"));
        let remaining = word_count - words_written;
        let chunk = remaining.min(150);
        for i in 0..chunk {
            text.push_str("word ");
            words_written += 1;
            if i % 20 == 19 {
                text.push_str("sentence. ");
            }
        }
        if paragraph % 4 == 0 {
            text.push_str(r#" <figure id="table_"#);
            text.push_str(&paragraph.to_string());
            text.push_str(r#"">row cell row cell row cell</figure> "#);
        }
        paragraph += 1;
    }
    PageInput { page_num, text }
}

fn generate_document(pages: usize, words_per_page: usize) -> Vec<PageInput> {
    (0..pages).map(|p| generate_page(p, words_per_page)).collect()
}

fn benchmark_varying_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_size");
    let cfg = ChunkerConfig::default();

    for pages in [1, 5, 10, 50].iter() {
        let doc = generate_document(*pages, 400);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{pages}_pages")), &doc, |b, doc| {
            b.iter(|| {
                let chunks = chunk_document(black_box(doc), &cfg);
                black_box(chunks);
            });
        });
    }
    group.finish();
}

fn benchmark_configurations(c: &mut Criterion) {
    let doc = generate_document(10, 400);
    let mut group = c.benchmark_group("configurations");

    group.bench_function("default", |b| {
        let cfg = ChunkerConfig::default();
        b.iter(|| black_box(chunk_document(black_box(&doc), &cfg)));
    });

    group.bench_function("small_chunks_200", |b| {
        let cfg = ChunkerConfig { max_tokens: 200, max_section_tokens: 300, ..ChunkerConfig::default() };
        b.iter(|| black_box(chunk_document(black_box(&doc), &cfg)));
    });

    group.bench_function("large_chunks_1200", |b| {
        let cfg = ChunkerConfig { max_tokens: 1200, max_section_tokens: 1600, ..ChunkerConfig::default() };
        b.iter(|| black_box(chunk_document(black_box(&doc), &cfg)));
    });

    group.bench_function("no_cross_page_overlap", |b| {
        let cfg = ChunkerConfig { cross_page_overlap: false, ..ChunkerConfig::default() };
        b.iter(|| black_box(chunk_document(black_box(&doc), &cfg)));
    });

    group.bench_function("tight_embedding_ceiling", |b| {
        let cfg = ChunkerConfig { embedding_max_tokens: Some(256), ..ChunkerConfig::default() };
        b.iter(|| black_box(chunk_document(black_box(&doc), &cfg)));
    });

    group.finish();
}

fn benchmark_table_heavy(c: &mut Criterion) {
    let mut pages = Vec::new();
    for p in 0..20 {
        let mut text = format!("## Appendix {p}\n\n");
        text.push_str("Results for this quarter are summarized below.\n\n");
        text.push_str(&format!(
            r#"<figure id="table_{p}">{}</figure>"#,
            "cell value ".repeat(400)
        ));
        pages.push(PageInput { page_num: p, text });
    }
    let cfg = ChunkerConfig::default();
    c.bench_function("table_heavy_document", |b| {
        b.iter(|| black_box(chunk_document(black_box(&pages), &cfg)));
    });
}

fn benchmark_multilingual(c: &mut Criterion) {
    let mut text = String::new();
    text.push_str("## はじめに\n\n");
    for _ in 0..100 {
        text.push_str("これはサンプルテキストです。");
    }
    text.push_str("\n\n## 详情\n\n");
    for _ in 0..100 {
        text.push_str("这是示例文本。");
    }
    let pages = vec![PageInput { page_num: 0, text }];
    let cfg = ChunkerConfig::default();
    c.bench_function("multilingual_cjk", |b| {
        b.iter(|| black_box(chunk_document(black_box(&pages), &cfg)));
    });
}

criterion_group!(
    benches,
    benchmark_varying_sizes,
    benchmark_configurations,
    benchmark_table_heavy,
    benchmark_multilingual
);
criterion_main!(benches);
