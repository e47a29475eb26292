// Execution unit seam - thread-pool implementation lives here, process model in infrastructure
use crate::application::aggregation::{Aggregator, ChunkReport, SessionPlan};
use crate::application::errors::{ExecutionError, SessionError};
use crate::domain::point::Chunk;
use crate::domain::result::ProcessingResult;
use async_trait::async_trait;

/// One session's isolated worker. Chunks are applied strictly in order.
#[async_trait]
pub trait ExecutionUnit: Send {
    /// Apply one chunk and report cumulative progress
    async fn apply(&mut self, chunk: Chunk) -> Result<ChunkReport, SessionError>;

    /// Freeze the session and produce its result
    async fn finish(&mut self) -> Result<ProcessingResult, SessionError>;

    /// Stop immediately, discarding partial state and releasing resources
    async fn terminate(&mut self);
}

/// Starts execution units for new sessions
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn launch(&self, plan: SessionPlan) -> Result<Box<dyn ExecutionUnit>, SessionError>;
}

/// Runs aggregation on the blocking thread pool
#[derive(Debug, Clone, Default)]
pub struct ThreadPoolBackend;

#[async_trait]
impl ExecutionBackend for ThreadPoolBackend {
    fn name(&self) -> &'static str {
        "thread-pool"
    }

    async fn launch(&self, plan: SessionPlan) -> Result<Box<dyn ExecutionUnit>, SessionError> {
        tracing::debug!(request_id = %plan.request_id, sampling = ?plan.sampling, "Starting thread unit");
        Ok(Box::new(ThreadUnit {
            aggregator: Some(Aggregator::new(plan)),
        }))
    }
}

pub struct ThreadUnit {
    // moved onto a blocking thread for each chunk and handed back afterwards
    aggregator: Option<Aggregator>,
}

impl ThreadUnit {
    fn take(&mut self) -> Result<Aggregator, SessionError> {
        self.aggregator
            .take()
            .ok_or_else(|| ExecutionError::Protocol("execution unit already stopped".into()).into())
    }
}

#[async_trait]
impl ExecutionUnit for ThreadUnit {
    async fn apply(&mut self, chunk: Chunk) -> Result<ChunkReport, SessionError> {
        let mut aggregator = self.take()?;
        let (aggregator, report) = tokio::task::spawn_blocking(move || {
            let report = aggregator.apply_chunk(&chunk);
            (aggregator, report)
        })
        .await
        .map_err(|e| ExecutionError::Panicked(e.to_string()))?;
        self.aggregator = Some(aggregator);
        Ok(report?)
    }

    async fn finish(&mut self) -> Result<ProcessingResult, SessionError> {
        let aggregator = self.take()?;
        let result = tokio::task::spawn_blocking(move || aggregator.finalize())
            .await
            .map_err(|e| ExecutionError::Panicked(e.to_string()))?;
        Ok(result)
    }

    async fn terminate(&mut self) {
        self.aggregator = None;
    }
}
