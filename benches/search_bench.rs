//! Benchmarks for in-memory collection search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use vector_lifecycle::workflow::random_entities;
use vector_lifecycle::{InMemoryService, SearchRequest, Vector, VectorService, WorkflowConfig};

fn loaded_service(runtime: &tokio::runtime::Runtime, config: &WorkflowConfig) -> InMemoryService {
    let service = InMemoryService::new();
    let mut rng = StdRng::seed_from_u64(42);
    let entities = random_entities(config, &mut rng);

    runtime.block_on(async {
        service.create_collection(&config.schema()).await.unwrap();
        service
            .insert(&config.collection_name, &entities)
            .await
            .unwrap();
        service
            .create_index(&config.collection_name, &config.index_params())
            .await
            .unwrap();
        service
            .load_collection(&config.collection_name)
            .await
            .unwrap();
    });
    service
}

fn benchmark_search(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("search");

    for size in [100, 1000, 10000].iter() {
        let config = WorkflowConfig {
            num_entities: *size,
            ..WorkflowConfig::default()
        };
        let service = loaded_service(&runtime, &config);
        let request = SearchRequest::new(&config.vector_field, vec![Vector::new(vec![0.5; 128])], 10)
            .with_params(config.search_params());

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                runtime
                    .block_on(service.search(black_box(&config.collection_name), black_box(&request)))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_search);
criterion_main!(benches);
