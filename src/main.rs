//! CLI for the collection lifecycle workflow

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vector_lifecycle::{
    ConnectionConfig, IndexKind, InMemoryService, MetricType, Settings, Workflow, WorkflowConfig,
    WorkflowReport,
};

#[derive(Parser)]
#[command(name = "vector-lifecycle")]
#[command(about = "Run a vector collection through create, insert, index, search and drop", long_about = None)]
struct Cli {
    /// JSON settings file with `connection` and `workflow` sections
    #[arg(long, env = "VECTOR_LIFECYCLE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Service host
    #[arg(long, env = "MILVUS_HOST", global = true)]
    host: Option<String>,

    /// Service port
    #[arg(long, env = "MILVUS_PORT", global = true)]
    port: Option<u16>,

    /// Connect over TLS
    #[arg(long, env = "MILVUS_SECURE", global = true)]
    secure: bool,

    /// PEM certificate to trust as the server's root
    #[arg(long, env = "MILVUS_SERVER_PEM_PATH", global = true)]
    server_pem_path: Option<PathBuf>,

    /// Name the server certificate is issued for
    #[arg(long, env = "MILVUS_SERVER_NAME", global = true)]
    server_name: Option<String>,

    /// Bearer token or `user:password`
    #[arg(long, env = "MILVUS_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,
}

impl ConnectionArgs {
    fn apply(self, config: &mut ConnectionConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.secure {
            config.secure = true;
        }
        if self.server_pem_path.is_some() {
            config.server_pem_path = self.server_pem_path;
        }
        if self.server_name.is_some() {
            config.server_name = self.server_name;
        }
        if self.token.is_some() {
            config.token = self.token;
        }
    }
}

#[derive(ValueEnum, Clone, Copy)]
enum IndexType {
    #[value(name = "FLAT")]
    Flat,
    #[value(name = "IVF_FLAT")]
    IvfFlat,
    #[value(name = "IVF_SQ8")]
    IvfSq8,
    #[value(name = "HNSW")]
    Hnsw,
    #[value(name = "AUTOINDEX")]
    AutoIndex,
}

#[derive(Args)]
struct RunArgs {
    /// Run against an in-process service instead of connecting
    #[arg(long)]
    in_memory: bool,

    /// Collection to create and drop
    #[arg(long)]
    collection: Option<String>,

    /// Vector dimension
    #[arg(long)]
    dim: Option<usize>,

    /// Number of entities to insert
    #[arg(long)]
    num_entities: Option<usize>,

    /// Index type to build on the vector field
    #[arg(long, value_enum, ignore_case = true)]
    index: Option<IndexType>,

    /// Clusters of an IVF index
    #[arg(long)]
    nlist: Option<u32>,

    /// Distance metric (L2, IP, COSINE)
    #[arg(long)]
    metric: Option<MetricType>,

    /// Clusters searched per IVF query
    #[arg(long)]
    nprobe: Option<u32>,

    /// Number of results per query
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Seed for the random vectors
    #[arg(long)]
    seed: Option<u64>,
}

impl RunArgs {
    fn apply(&self, config: &mut WorkflowConfig) {
        if let Some(name) = &self.collection {
            config.collection_name = name.clone();
        }
        if let Some(dim) = self.dim {
            config.dim = dim;
        }
        if let Some(n) = self.num_entities {
            config.num_entities = n;
        }

        let nlist = self.nlist.unwrap_or(match config.index {
            IndexKind::IvfFlat { nlist } | IndexKind::IvfSq8 { nlist } => nlist,
            _ => 1024,
        });
        config.index = match (self.index, config.index) {
            (Some(IndexType::Flat), _) => IndexKind::Flat,
            (Some(IndexType::IvfFlat), _) => IndexKind::IvfFlat { nlist },
            (Some(IndexType::IvfSq8), _) => IndexKind::IvfSq8 { nlist },
            (Some(IndexType::Hnsw), IndexKind::Hnsw { m, ef_construction }) => {
                IndexKind::Hnsw { m, ef_construction }
            }
            (Some(IndexType::Hnsw), _) => IndexKind::Hnsw {
                m: 16,
                ef_construction: 200,
            },
            (Some(IndexType::AutoIndex), _) => IndexKind::AutoIndex,
            (None, IndexKind::IvfFlat { .. }) => IndexKind::IvfFlat { nlist },
            (None, IndexKind::IvfSq8 { .. }) => IndexKind::IvfSq8 { nlist },
            (None, other) => other,
        };

        if let Some(metric) = self.metric {
            config.metric = metric;
        }
        if let Some(nprobe) = self.nprobe {
            config.nprobe = nprobe;
        }
        if let Some(k) = self.top_k {
            config.top_k = k;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full collection lifecycle
    Run(RunArgs),
    /// Start the HTTP emulator of the service
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "0.0.0.0:19530")]
        addr: String,
    },
}

fn print_report(report: &WorkflowReport) {
    for (i, result) in report.results.iter().enumerate() {
        println!("Search result for {}th vector: ", i);
        for (j, hit) in result.iter().enumerate() {
            println!("Top {}: id: {}, distance: {}", j, hit.id, hit.distance);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    cli.connection.apply(&mut settings.connection);

    match cli.command {
        Commands::Serve { addr } => {
            vector_lifecycle::server::start(&addr).await?;
        }
        Commands::Run(args) => {
            args.apply(&mut settings.workflow);
            let report = if args.in_memory {
                Workflow::new(InMemoryService::new())
                    .run(&settings.workflow)
                    .await?
            } else {
                Workflow::connect(&settings.connection)
                    .await?
                    .run(&settings.workflow)
                    .await?
            };
            print_report(&report);
        }
    }
    Ok(())
}
