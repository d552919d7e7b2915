mod activation;
mod api;
mod config;
mod kv;
mod prompts;
mod store;
mod watcher;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::Request;
use clap::Parser;
use dotenvy::dotenv;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::activation::ActivationService;
use crate::activation::client::{HttpActivationClient, REQUEST_TIMEOUT};
use crate::activation::device::DeviceInfo;
use crate::config::Config;
use crate::kv::KeyValueStore;
use crate::kv::file_store::FileKeyValueStore;
use crate::prompts::kv_repository::KvPromptRepository;
use crate::prompts::seed::SystemSeed;
use crate::store::PromptStore;

#[derive(Parser)]
#[command(name = "promptdock", about = "Prompt library with a local bridge for its windows")]
enum Cli {
    /// Start the local HTTP bridge (default when no subcommand is given)
    #[command(alias = "run")]
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print prompts as `<category>\t<title>` lines
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let cli = if args.len() <= 1 {
        Cli::Serve { port: None }
    } else {
        Cli::parse()
    };

    let config = Config::from_env();
    init_tracing();
    let _guard = sentry::init((
        config.sentry_dsn.clone().unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            send_default_pii: false,
            traces_sample_rate: 0.2,
            enable_logs: true,
            ..Default::default()
        },
    ));

    match cli {
        Cli::Serve { port } => run_server(config, port).await,
        Cli::List { category, query } => {
            list_prompts(&config, category.as_deref(), query.as_deref()).await?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("promptdock=info,tower_http=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true).with_bracketed_fields(false))
        .with(sentry::integrations::tracing::layer().event_filter(
            |metadata| match *metadata.level() {
                tracing::Level::ERROR => sentry::integrations::tracing::EventFilter::Event,
                tracing::Level::WARN | tracing::Level::INFO => {
                    sentry::integrations::tracing::EventFilter::Breadcrumb
                }
                _ => sentry::integrations::tracing::EventFilter::Ignore,
            },
        ))
        .init();
}

fn load_seed(config: &Config) -> Result<Arc<SystemSeed>> {
    let seed = match &config.seed_path {
        Some(path) => SystemSeed::from_path(path)?,
        None => SystemSeed::bundled()?,
    };
    tracing::info!(version = seed.version(), prompts = seed.prompts().len(), "loaded system seed");
    Ok(Arc::new(seed))
}

async fn open_store(config: &Config, kv: Arc<dyn KeyValueStore>) -> Result<Arc<PromptStore>> {
    let seed = load_seed(config)?;
    let repo = Arc::new(KvPromptRepository::new(kv, seed));
    let store = Arc::new(PromptStore::new(repo, config.fallback_category.clone()));
    store.initialize().await;
    Ok(store)
}

async fn list_prompts(config: &Config, category: Option<&str>, query: Option<&str>) -> Result<()> {
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(&config.data_dir));
    let store = open_store(config, kv).await?;
    for prompt in store.filter_prompts(category, query).await {
        println!("{}\t{}", prompt.category, prompt.title);
    }
    Ok(())
}

async fn run_server(config: Config, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(&config.data_dir));
    let store = open_store(&config, kv.clone())
        .await
        .context("failed to open prompt store")?;

    let _watcher = match watcher::StorageWatcher::start(config.data_dir.clone(), store.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "external edits will not be picked up");
            None
        }
    };

    let http_client = Arc::new(
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?,
    );
    let activation = Arc::new(ActivationService::new(
        Arc::new(HttpActivationClient::new(http_client, config.activation_url.clone())),
        kv,
        DeviceInfo::current(),
    ));

    let app_state = api::AppState { store, activation };

    let app = api::build_router(app_state)
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(NewSentryLayer::<Request<Body>>::new_from_top());

    let port = port.unwrap_or(config.port);
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(data_dir = %config.data_dir.display(), "serving prompt store");
    println!("Listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
