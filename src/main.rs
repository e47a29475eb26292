// Main entry point - Dependency injection and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;

use crate::application::execution::{ExecutionBackend, ThreadPoolBackend};
use crate::application::session_manager::SessionManager;
use crate::infrastructure::config::{ExecutionModel, load_app_config};
use crate::infrastructure::process_unit::ProcessBackend;
use crate::infrastructure::{logging, worker};
use crate::presentation::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Child mode for the process execution model
    if std::env::args().nth(1).as_deref() == Some(worker::WORKER_ARG) {
        logging::init_worker()?;
        if let Err(e) = worker::run().await {
            eprintln!("worker failed: {e:#}");
            std::process::exit(1);
        }
        return Ok(());
    }

    // Initialize tracing
    logging::init()?;

    // Load configuration
    let config = load_app_config()?;
    let pipeline = config.pipeline;

    // Create execution backend
    let backend: Arc<dyn ExecutionBackend> = match pipeline.execution_model {
        ExecutionModel::ThreadPool => Arc::new(ThreadPoolBackend),
        ExecutionModel::Process => Arc::new(ProcessBackend::from_config(&pipeline)?),
    };
    tracing::info!(
        backend = backend.name(),
        pool = pipeline.worker_pool_size,
        sample_cap = pipeline.sample_cap,
        "Execution backend ready"
    );

    let state = Arc::new(AppState {
        sessions: SessionManager::new(backend, pipeline),
    });

    // Build router (presentation layer)
    // Note: payloads are compressed by the response helpers, so no CompressionLayer
    let router = presentation::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!(%addr, "Starting geo-stream service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
