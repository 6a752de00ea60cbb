//! Benchmarks for chunking, embedding and tenant-scoped retrieval

use std::fs;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use supportdesk::config::{IngestConfig, RetrievalConfig};
use supportdesk::embedding::{Embedder, HashedEmbedder};
use supportdesk::index::VectorIndex;
use supportdesk::ingest::{split_text, DocumentIngestor};
use supportdesk::realtime::RealtimeManager;
use supportdesk::retrieval::Retriever;
use supportdesk::storage::Storage;
use supportdesk::tenants::{NewTenant, TenantRegistry};

const TOPICS: [&str; 8] = [
    "Refunds are processed within five business days after the returned item arrives",
    "Shipping to Europe takes three to seven days depending on the carrier",
    "The Pro plan includes priority support and unlimited projects",
    "Passwords can be reset from the login page using the forgot password link",
    "Invoices are emailed on the first day of each billing period",
    "Two-factor authentication can be enabled in the security settings",
    "Our support team is available from nine to five on weekdays",
    "Data exports are delivered as CSV files within one hour",
];

fn corpus(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("{}. Note {} adds some extra wording.", TOPICS[i % TOPICS.len()], i))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn setup_retriever(documents: usize) -> (Retriever, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::open_in_memory().unwrap();
    let tenants = TenantRegistry::new(storage.clone());
    tenants.create_tenant(NewTenant::new("acme", "Acme")).unwrap();

    let index = VectorIndex::new(storage.clone(), Arc::new(HashedEmbedder::new(384)));
    let ingestor = DocumentIngestor::new(
        storage,
        tenants,
        index.clone(),
        IngestConfig::default(),
        dir.path().join("uploads"),
        RealtimeManager::new(),
    )
    .unwrap();

    for i in 0..documents {
        let path = dir.path().join(format!("doc_{}.txt", i));
        fs::write(&path, format!("Document {}\n\n{}", i, corpus(20))).unwrap();
        ingestor.ingest_file("acme", &path, None).unwrap();
    }

    (Retriever::new(index, RetrievalConfig::default()), dir)
}

fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");

    for paragraphs in [10, 100, 1000] {
        let text = corpus(paragraphs);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("paragraphs", paragraphs), &text, |b, text| {
            b.iter(|| split_text(black_box(text), 1000, 150))
        });
    }

    group.finish();
}

fn bench_hashed_embedding(c: &mut Criterion) {
    let embedder = HashedEmbedder::new(384);
    let mut group = c.benchmark_group("hashed_embedding");

    let chunk = corpus(6);
    let texts = [("query", "how long do refunds take"), ("chunk", chunk.as_str())];
    for (name, text) in texts {
        group.bench_with_input(BenchmarkId::new("text", name), &text, |b, text| {
            b.iter(|| embedder.embed(black_box(text)).unwrap())
        });
    }

    group.finish();
}

fn bench_retrieval(c: &mut Criterion) {
    let mut group = c.benchmark_group("retrieval");

    for documents in [10, 50] {
        let (retriever, _dir) = setup_retriever(documents);
        group.bench_with_input(
            BenchmarkId::new("documents", documents),
            &retriever,
            |b, retriever| {
                b.iter(|| {
                    retriever
                        .retrieve_default("acme", black_box("how long do refunds take"))
                        .unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_chunking, bench_hashed_embedding, bench_retrieval);
criterion_main!(benches);
