//! Order flow - conversational order-taking service
//!
//! A Rust backend driving a multi-turn order conversation (route, extract
//! products, search, confirm, quantity, finalize) with an LLM classifier.

mod api;
mod catalog;
mod classifier;
mod config;
mod db;
mod llm;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use catalog::ProductCatalog;
use classifier::{CallPolicy, LlmIntentClassifier};
use config::Settings;
use db::Database;
use runtime::{CheckpointStore, ConversationManager, MemoryCheckpointStore, SqliteCheckpointStore};
use state_machine::Workflow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_flow=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json().with_span_list(false))
        .init();

    let settings = Settings::from_env()?;

    // Classifier
    let llm = llm::connect(&settings.llm);
    tracing::info!(model = %llm.model_id(), "LLM client initialized");
    let policy = CallPolicy {
        max_attempts: settings.llm.max_retries.max(1),
        attempt_timeout: settings.llm.timeout,
        ..CallPolicy::default()
    };
    let classifier = Arc::new(LlmIntentClassifier::new(llm, policy));

    // Checkpoint store
    let checkpoints: Option<Arc<dyn CheckpointStore>> = match (&settings.db_path, settings.checkpoints) {
        (_, false) => {
            tracing::info!("Checkpoints disabled, callers must echo conversation state");
            None
        }
        (Some(path), true) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let db = Database::open(path)?;
            tracing::info!(
                path = %path.display(),
                pending = db.checkpoint_count()?,
                "Opened checkpoint database"
            );
            Some(Arc::new(SqliteCheckpointStore::new(db)))
        }
        (None, true) => {
            tracing::info!("Using in-memory checkpoints");
            Some(Arc::new(MemoryCheckpointStore::new()))
        }
    };

    let ttl = chrono::Duration::from_std(settings.checkpoint_ttl)?;
    let workflow = Workflow::new(classifier, Arc::new(ProductCatalog::default()));
    let conversations = Arc::new(ConversationManager::new(workflow, checkpoints, ttl));

    spawn_checkpoint_purge(conversations.clone(), settings.checkpoint_ttl);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(conversations))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!("Order flow server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop checkpoints nobody came back for
fn spawn_checkpoint_purge(conversations: Arc<ConversationManager>, ttl: Duration) {
    let period = (ttl / 2).max(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            match conversations.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Purged expired checkpoints"),
                Err(e) => tracing::warn!(error = %e, "Checkpoint purge failed"),
            }
        }
    });
}
