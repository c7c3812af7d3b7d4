//! The REST client against the HTTP emulator

use approx::assert_abs_diff_eq;
use tokio::net::TcpListener;
use vector_lifecycle::server::{self, AppState};
use vector_lifecycle::{
    ConnectionConfig, ErrorKind, InMemoryService, IndexKind, IndexParams, MetricType,
    SearchRequest, Vector, VectorService, Workflow, WorkflowConfig,
};

async fn spawn_emulator() -> ConnectionConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(server::serve(listener, AppState::new(InMemoryService::new())));
    ConnectionConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..ConnectionConfig::default()
    }
}

fn small() -> WorkflowConfig {
    WorkflowConfig {
        dim: 32,
        num_entities: 500,
        index: IndexKind::IvfFlat { nlist: 64 },
        seed: Some(7),
        ..WorkflowConfig::default()
    }
}

#[tokio::test]
async fn test_full_run_over_rest() {
    let connection = spawn_emulator().await;
    let mut workflow = Workflow::connect(&connection).await.unwrap();
    assert_eq!(workflow.session().endpoint(), connection.uri());

    let report = workflow.run(&small()).await.unwrap();
    assert_eq!(report.collections, vec!["demo".to_string()]);
    assert_eq!(report.insert.insert_count, 500);
    assert_eq!(report.insert.ids.len(), 500);

    let hits = &report.results[0];
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, 2);
    assert_abs_diff_eq!(hits[0].distance, 0.0, epsilon = 1e-6);

    assert!(!workflow.has_collection("demo").await.unwrap());
}

#[tokio::test]
async fn test_errors_keep_their_kind_over_rest() {
    let connection = spawn_emulator().await;
    let mut workflow = Workflow::connect(&connection).await.unwrap();
    let config = small();

    let err = workflow.drop_collection("demo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    workflow.create_collection(&config.schema()).await.unwrap();
    let duplicate = workflow.session().create_collection(&config.schema()).await.unwrap_err();
    assert_eq!(duplicate.kind(), ErrorKind::Schema);

    workflow.build_index("demo", &config.index_params()).await.unwrap();
    workflow.build_index("demo", &config.index_params()).await.unwrap();
    let conflicting = IndexParams::new("float_vector_field", IndexKind::Flat, MetricType::Cosine);
    let err = workflow.build_index("demo", &conflicting).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);

    // bypass the local state check to see the service's answer
    let request = SearchRequest::new("float_vector_field", vec![Vector::new(vec![0.1; 32])], 3);
    let err = workflow.session().search("demo", &request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotLoaded);

    workflow.load("demo").await.unwrap();
    let err = workflow.session().drop_index("demo", "float_vector_field").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);

    workflow.release("demo").await.unwrap();
    workflow.drop_index("demo", "float_vector_field").await.unwrap();
    let err = workflow.drop_index("demo", "float_vector_field").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    workflow.drop_collection("demo").await.unwrap();
}

#[tokio::test]
async fn test_describe_round_trips_schema() {
    let connection = spawn_emulator().await;
    let workflow = Workflow::connect(&connection).await.unwrap();
    let schema = small().schema();

    workflow.session().create_collection(&schema).await.unwrap();
    let described = workflow.session().describe_collection("demo").await.unwrap();
    assert_eq!(described, schema);

    let index = IndexParams::new("float_vector_field", IndexKind::Hnsw { m: 8, ef_construction: 64 }, MetricType::L2);
    workflow.session().create_index("demo", &index).await.unwrap();
    assert_eq!(
        workflow.session().describe_index("demo", "float_vector_field").await.unwrap(),
        index
    );
}

#[tokio::test]
async fn test_connect_to_closed_port() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let connection = ConnectionConfig {
        port,
        request_timeout_secs: 2,
        ..ConnectionConfig::default()
    };
    let err = Workflow::connect(&connection).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Connection);
}
