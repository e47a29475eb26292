// Session lifecycle manager - registry, chunk intake, cancellation and result retrieval
use crate::application::aggregation::SessionPlan;
use crate::application::errors::{SessionError, TransportError};
use crate::application::execution::{ExecutionBackend, ExecutionUnit};
use crate::application::progress::ProgressCoordinator;
use crate::domain::point::Chunk;
use crate::domain::progress::ProgressEvent;
use crate::domain::result::{Page, ProcessingResult, ResultSummary};
use crate::domain::session::{SessionEvent, SessionState};
use crate::infrastructure::config::PipelineConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc, watch};
use tracing::{debug, info, warn};

/// Page size used when the caller asks for zero or fewer points
const DEFAULT_PAGE_SIZE: usize = 1000;

/// Per-session overrides of the pipeline defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    #[serde(default)]
    pub total_expected_points: Option<u64>,
    #[serde(default)]
    pub sample_cap: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub request_id: String,
    pub state: SessionState,
    pub processed: u64,
}

/// Signal from the coordinator to a session runner
#[derive(Debug, Clone, PartialEq)]
enum Control {
    Run,
    Cancel,
    Abort(String),
}

type ChunkSender = Arc<tokio::sync::Mutex<Option<mpsc::Sender<Chunk>>>>;

struct SessionEntry {
    generation: u64,
    state: SessionState,
    next_sequence: u32,
    processed: u64,
    // held across the send so chunks reach the runner in validated order
    chunks: ChunkSender,
    events: Option<mpsc::UnboundedReceiver<ProgressEvent>>,
    control: watch::Sender<Control>,
    result: Option<Arc<ProcessingResult>>,
}

#[derive(Clone)]
pub struct SessionManager {
    registry: Arc<Mutex<HashMap<String, SessionEntry>>>,
    backend: Arc<dyn ExecutionBackend>,
    pool: Arc<Semaphore>,
    config: PipelineConfig,
    generations: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn ExecutionBackend>, config: PipelineConfig) -> Self {
        info!(
            backend = backend.name(),
            pool = config.worker_pool_size,
            sample_cap = config.sample_cap,
            "Session manager ready"
        );
        Self {
            registry: Arc::new(Mutex::new(HashMap::new())),
            backend,
            pool: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
            config,
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open a session ahead of its first chunk, fixing its sampling plan
    pub fn open(&self, request_id: &str, options: SessionOptions) -> Result<(), SessionError> {
        let mut registry = self.registry.lock();
        if registry.contains_key(request_id) {
            return Err(SessionError::AlreadyExists(request_id.to_string()));
        }
        let entry = self.spawn_session(request_id, options);
        registry.insert(request_id.to_string(), entry);
        Ok(())
    }

    /// Hand one chunk to the session's execution unit. Validation failures
    /// abort the session and are returned synchronously.
    pub async fn submit(&self, request_id: &str, chunk: Chunk) -> Result<(), SessionError> {
        let sender = {
            let mut registry = self.registry.lock();
            if !registry.contains_key(request_id) {
                if chunk.sequence != 1 {
                    return Err(TransportError::OutOfOrder {
                        expected: 1,
                        got: chunk.sequence,
                    }
                    .into());
                }
                let entry = self.spawn_session(request_id, SessionOptions::default());
                registry.insert(request_id.to_string(), entry);
            }
            match registry.get(request_id) {
                Some(entry) => entry.chunks.clone(),
                None => return Err(SessionError::NotFound(request_id.to_string())),
            }
        };

        let mut guard = sender.lock().await;
        let is_final = chunk.is_final;
        {
            let mut registry = self.registry.lock();
            let Some(entry) = registry.get_mut(request_id) else {
                return Err(SessionError::NotFound(request_id.to_string()));
            };
            if guard.is_none() || !entry.state.accepts_chunks() {
                return Err(TransportError::SessionClosed(entry.state).into());
            }
            if let Err(e) = validate_chunk(entry.next_sequence, &chunk) {
                drop(registry);
                warn!(request_id, error = %e, "Rejecting chunk");
                self.abort(request_id, &e.to_string());
                return Err(e.into());
            }
            let event = if is_final {
                SessionEvent::FinalChunk
            } else {
                SessionEvent::ChunkAccepted
            };
            entry.state = entry
                .state
                .next(event)
                .map_err(|_| TransportError::SessionClosed(entry.state))?;
            entry.next_sequence += 1;
        }

        debug!(request_id, sequence = chunk.sequence, points = chunk.points.len(), is_final, "Queueing chunk");
        let sent = match guard.as_ref() {
            Some(tx) => tx.send(chunk).await.is_ok(),
            None => false,
        };
        if is_final {
            guard.take();
        }
        if !sent {
            let state = self
                .registry
                .lock()
                .get(request_id)
                .map(|e| e.state)
                .unwrap_or(SessionState::Cancelled);
            return Err(TransportError::SessionClosed(state).into());
        }
        Ok(())
    }

    /// Stop a session and drop its registry entry, whatever state it is in
    pub fn cancel(&self, request_id: &str) -> Result<(), SessionError> {
        let entry = self
            .registry
            .lock()
            .remove(request_id)
            .ok_or_else(|| SessionError::NotFound(request_id.to_string()))?;
        info!(request_id, state = %entry.state, "Cancelling session");
        let _ = entry.control.send(Control::Cancel);
        Ok(())
    }

    /// Fail a session from the coordinator side, e.g. when its producer breaks
    pub fn abort(&self, request_id: &str, reason: &str) {
        if let Some(entry) = self.registry.lock().remove(request_id) {
            warn!(request_id, reason, "Aborting session");
            let _ = entry.control.send(Control::Abort(reason.to_string()));
        }
    }

    pub fn status(&self, request_id: &str) -> Result<SessionStatus, SessionError> {
        let registry = self.registry.lock();
        let entry = registry
            .get(request_id)
            .ok_or_else(|| SessionError::NotFound(request_id.to_string()))?;
        Ok(SessionStatus {
            request_id: request_id.to_string(),
            state: entry.state,
            processed: entry.processed,
        })
    }

    /// Take the session's progress stream. Only one subscriber per session.
    pub fn subscribe(
        &self,
        request_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<ProgressEvent>, SessionError> {
        let mut registry = self.registry.lock();
        let entry = registry
            .get_mut(request_id)
            .ok_or_else(|| SessionError::NotFound(request_id.to_string()))?;
        entry
            .events
            .take()
            .ok_or_else(|| SessionError::AlreadySubscribed(request_id.to_string()))
    }

    /// Statistics and sample metadata of a completed session
    pub fn summary(&self, request_id: &str) -> Result<ResultSummary, SessionError> {
        Ok(self.completed_result(request_id)?.summary())
    }

    /// One page of a completed session's sample. The session is released
    /// once the last page has been served.
    pub fn fetch(&self, request_id: &str, offset: i64, chunk_size: i64) -> Result<Page, SessionError> {
        let result = self.completed_result(request_id)?;
        let offset = offset.max(0) as usize;
        let chunk_size = if chunk_size > 0 {
            chunk_size as usize
        } else {
            DEFAULT_PAGE_SIZE
        };
        let page = result.page(offset, chunk_size);
        if page.is_complete {
            let mut registry = self.registry.lock();
            if registry
                .get(request_id)
                .is_some_and(|e| e.result.as_ref().is_some_and(|r| Arc::ptr_eq(r, &result)))
            {
                registry.remove(request_id);
                debug!(request_id, "Result fully retrieved, session released");
            }
        }
        Ok(page)
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.lock().len()
    }

    fn completed_result(&self, request_id: &str) -> Result<Arc<ProcessingResult>, SessionError> {
        let registry = self.registry.lock();
        let entry = registry
            .get(request_id)
            .ok_or_else(|| SessionError::NotFound(request_id.to_string()))?;
        match (&entry.result, entry.state) {
            (Some(result), SessionState::Completed) => Ok(result.clone()),
            (_, state) => Err(SessionError::NotReady {
                id: request_id.to_string(),
                state,
            }),
        }
    }

    fn spawn_session(&self, request_id: &str, options: SessionOptions) -> SessionEntry {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let plan = SessionPlan::new(
            request_id,
            options.sample_cap.unwrap_or(self.config.sample_cap),
            options
                .total_expected_points
                .or(self.config.total_expected_points),
            self.config.reservoir_seed,
        );
        let (chunk_tx, chunk_rx) = mpsc::channel(self.config.chunk_queue_depth.max(1));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = watch::channel(Control::Run);

        info!(request_id, generation, sampling = ?plan.sampling, "Opening session");
        let runner = SessionRunner {
            manager: self.clone(),
            request_id: request_id.to_string(),
            generation,
            progress: ProgressCoordinator::new(
                request_id,
                plan.total_expected_points,
                self.config.progress_throttle(),
            ),
            plan,
            events: event_tx,
            control: control_rx,
        };
        tokio::spawn(runner.run(chunk_rx));

        SessionEntry {
            generation,
            state: SessionState::Idle,
            next_sequence: 1,
            processed: 0,
            chunks: Arc::new(tokio::sync::Mutex::new(Some(chunk_tx))),
            events: Some(event_rx),
            control: control_tx,
            result: None,
        }
    }

    fn with_entry(&self, request_id: &str, generation: u64, f: impl FnOnce(&mut SessionEntry)) {
        let mut registry = self.registry.lock();
        if let Some(entry) = registry.get_mut(request_id) {
            if entry.generation == generation {
                f(entry);
            }
        }
    }

    fn release(&self, request_id: &str, generation: u64) {
        let mut registry = self.registry.lock();
        if registry
            .get(request_id)
            .is_some_and(|e| e.generation == generation)
        {
            registry.remove(request_id);
        }
    }
}

fn validate_chunk(expected: u32, chunk: &Chunk) -> Result<(), TransportError> {
    if chunk.sequence != expected {
        return Err(TransportError::OutOfOrder {
            expected,
            got: chunk.sequence,
        });
    }
    if chunk.sequence > chunk.total_chunks {
        return Err(TransportError::BeyondTotal {
            sequence: chunk.sequence,
            total_chunks: chunk.total_chunks,
        });
    }
    if chunk.points_in_chunk as usize != chunk.points.len() {
        return Err(TransportError::PointCountMismatch {
            sequence: chunk.sequence,
            declared: chunk.points_in_chunk,
            actual: chunk.points.len(),
        });
    }
    let final_expected = chunk.is_final || chunk.sequence == chunk.total_chunks;
    if final_expected && chunk.points.is_empty() {
        return Err(TransportError::EmptyFinalChunk {
            sequence: chunk.sequence,
        });
    }
    Ok(())
}

/// Owns one session's execution unit and drives it chunk by chunk
struct SessionRunner {
    manager: SessionManager,
    request_id: String,
    generation: u64,
    plan: SessionPlan,
    progress: ProgressCoordinator,
    events: mpsc::UnboundedSender<ProgressEvent>,
    control: watch::Receiver<Control>,
}

impl SessionRunner {
    async fn run(mut self, mut chunks: mpsc::Receiver<Chunk>) {
        let started = Instant::now();
        let mut unit: Option<Box<dyn ExecutionUnit>> = None;
        let outcome = self.drive(&mut chunks, &mut unit).await;

        // every exit path stops the unit, which releases its resources
        if outcome.is_err() {
            if let Some(unit) = unit.as_mut() {
                unit.terminate().await;
            }
        }
        drop(unit);

        let request_id = self.request_id.clone();
        match outcome {
            Ok(result) => {
                let result = Arc::new(result);
                info!(
                    request_id = %request_id,
                    processed = result.stats.total_processed,
                    sample = result.sample.meta.sample_size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Session completed"
                );
                self.manager.with_entry(&request_id, self.generation, |entry| {
                    match entry.state.next(SessionEvent::Finalized) {
                        Ok(state) => entry.state = state,
                        Err(e) => warn!(request_id = %request_id, error = %e, "Unexpected state on completion"),
                    }
                    entry.processed = result.stats.total_processed;
                    entry.result = Some(result.clone());
                });
                debug!(request_id = %request_id, active = self.manager.active_sessions(), "Result ready for retrieval");
                let event = self.progress.complete(Instant::now());
                self.emit(event);
            }
            Err(SessionError::Cancelled(_)) => {
                info!(request_id = %request_id, processed = self.progress.processed(), "Session cancelled");
                self.manager.release(&request_id, self.generation);
                let event = self.progress.cancelled(Instant::now());
                self.emit(event);
            }
            Err(e) => {
                e.log_error(&request_id);
                self.manager.release(&request_id, self.generation);
                let message = e.to_string();
                let event = self.progress.failed(e.kind(), &message, Instant::now());
                self.emit(event);
            }
        }
    }

    async fn drive(
        &mut self,
        chunks: &mut mpsc::Receiver<Chunk>,
        unit: &mut Option<Box<dyn ExecutionUnit>>,
    ) -> Result<ProcessingResult, SessionError> {
        let Some(first) = self.next_chunk(chunks).await? else {
            return Err(self.stop_reason());
        };

        let _permit = tokio::select! {
            biased;
            _ = self.control.changed() => return Err(self.stop_reason()),
            permit = self.manager.pool.clone().acquire_owned() => permit
                .map_err(|_| SessionError::Cancelled(self.request_id.clone()))?,
        };
        let backend = self.manager.backend.clone();
        let launched = tokio::select! {
            biased;
            _ = self.control.changed() => return Err(self.stop_reason()),
            launched = backend.launch(self.plan.clone()) => launched?,
        };
        let unit = unit.insert(launched);

        let mut pending = Some(first);
        loop {
            let chunk = match pending.take() {
                Some(chunk) => chunk,
                None => match self.next_chunk(chunks).await? {
                    Some(chunk) => chunk,
                    None => return Err(self.stop_reason()),
                },
            };
            let is_final = chunk.is_final;
            let sequence = chunk.sequence;

            let report = tokio::select! {
                biased;
                _ = self.control.changed() => return Err(self.stop_reason()),
                report = unit.apply(chunk) => report?,
            };
            debug!(
                request_id = %self.request_id,
                sequence,
                accepted = report.accepted,
                invalid = report.invalid,
                processed = report.processed,
                "Chunk applied"
            );
            self.manager.with_entry(&self.request_id, self.generation, |entry| {
                entry.processed = report.processed;
            });
            let event = self.progress.chunk_applied(&report, Instant::now());
            self.emit(event);

            if is_final {
                break;
            }
        }

        let event = self.progress.finalizing(Instant::now());
        self.emit(event);
        tokio::select! {
            biased;
            _ = self.control.changed() => Err(self.stop_reason()),
            result = unit.finish() => result,
        }
    }

    /// Next queued chunk, `Ok(None)` once the queue is closed. Cancellation
    /// is observed here, between chunks.
    async fn next_chunk(
        &mut self,
        chunks: &mut mpsc::Receiver<Chunk>,
    ) -> Result<Option<Chunk>, SessionError> {
        if *self.control.borrow() != Control::Run {
            return Err(self.stop_reason());
        }
        tokio::select! {
            biased;
            _ = self.control.changed() => Err(self.stop_reason()),
            chunk = chunks.recv() => Ok(chunk),
        }
    }

    fn stop_reason(&self) -> SessionError {
        match &*self.control.borrow() {
            Control::Abort(message) => SessionError::Aborted(message.clone()),
            // a dropped control sender means the entry was removed
            Control::Cancel | Control::Run => SessionError::Cancelled(self.request_id.clone()),
        }
    }

    fn emit(&self, event: Option<ProgressEvent>) {
        if let Some(event) = event {
            // no subscriber is fine
            let _ = self.events.send(event);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::application::aggregation::tests::make_chunks;
    use crate::application::execution::ThreadPoolBackend;
    use crate::domain::progress::{ErrorKind, Phase};
    use std::time::Duration;

    pub(crate) fn test_config() -> PipelineConfig {
        PipelineConfig {
            sample_cap: 300,
            progress_throttle_ms: 0,
            ..PipelineConfig::default()
        }
    }

    fn thread_manager(config: PipelineConfig) -> SessionManager {
        SessionManager::new(Arc::new(ThreadPoolBackend), config)
    }

    /// Collect events until the terminal one
    pub(crate) async fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for session events")
                .expect("event channel closed before terminal event");
            let terminal = event.phase.is_terminal();
            events.push(event);
            if terminal {
                return events;
            }
        }
    }

    fn fetch_all(manager: &SessionManager, id: &str, page_size: i64) -> Vec<[f64; 3]> {
        let mut offset = 0;
        let mut points = Vec::new();
        loop {
            let page = manager.fetch(id, offset, page_size).unwrap();
            points.extend(page.chunk);
            if page.is_complete {
                return points;
            }
            offset = page.next_offset as i64;
        }
    }

    #[tokio::test]
    async fn test_three_chunk_session_completes_and_paginates() {
        let manager = thread_manager(test_config());
        manager
            .open(
                "s1",
                SessionOptions {
                    total_expected_points: Some(1500),
                    sample_cap: None,
                },
            )
            .unwrap();
        let mut rx = manager.subscribe("s1").unwrap();
        for chunk in make_chunks(&[500, 500, 500]) {
            manager.submit("s1", chunk).await.unwrap();
        }

        let events = drain(&mut rx).await;
        let last = events.last().unwrap();
        assert_eq!(last.phase, Phase::Complete);
        assert_eq!(last.percentage, 100.0);
        assert_eq!(last.processed, 1500);
        assert!(events.windows(2).all(|w| w[0].percentage <= w[1].percentage));
        assert!(events.windows(2).all(|w| w[0].processed <= w[1].processed));
        assert_eq!(events.iter().filter(|e| e.percentage >= 100.0).count(), 1);

        let summary = manager.summary("s1").unwrap();
        assert_eq!(summary.stats.total_processed, 1500);
        assert_eq!(summary.meta.sample_size, 300);
        assert_eq!(manager.status("s1").unwrap().state, SessionState::Completed);

        let points = fetch_all(&manager, "s1", 128);
        assert_eq!(points.len(), 300);
        assert!(matches!(manager.status("s1"), Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_first_chunk_opens_session_with_defaults() {
        let manager = thread_manager(test_config());
        let chunks = make_chunks(&[40, 2]);
        manager.submit("auto", chunks[0].clone()).await.unwrap();
        let mut rx = manager.subscribe("auto").unwrap();
        manager.submit("auto", chunks[1].clone()).await.unwrap();

        assert_eq!(drain(&mut rx).await.last().unwrap().phase, Phase::Complete);
        // no declared total: reservoir keeps everything below the cap
        assert_eq!(fetch_all(&manager, "auto", 0).len(), 42);
    }

    #[tokio::test]
    async fn test_out_of_order_chunk_aborts_session() {
        let manager = thread_manager(test_config());
        let chunks = make_chunks(&[10, 10, 10]);
        manager.submit("s", chunks[0].clone()).await.unwrap();
        let mut rx = manager.subscribe("s").unwrap();

        let err = manager.submit("s", chunks[2].clone()).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Transport(TransportError::OutOfOrder {
                expected: 2,
                got: 3
            })
        ));
        let last = drain(&mut rx).await.pop().unwrap();
        assert_eq!(last.phase, Phase::Error);
        assert_eq!(last.error.unwrap().kind, ErrorKind::Transport);
        assert!(manager.status("s").is_err());

        // a fresh stream must restart at sequence 1
        assert!(manager.submit("s", chunks[1].clone()).await.is_err());
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_chunk_validation_rules() {
        let mut chunk = make_chunks(&[5]).remove(0);
        assert!(validate_chunk(1, &chunk).is_ok());

        chunk.points_in_chunk = 6;
        assert!(matches!(
            validate_chunk(1, &chunk),
            Err(TransportError::PointCountMismatch { declared: 6, actual: 5, .. })
        ));

        let empty_final = Chunk::new(vec![], 2, 2);
        assert!(matches!(
            validate_chunk(2, &empty_final),
            Err(TransportError::EmptyFinalChunk { sequence: 2 })
        ));

        let empty_middle = Chunk::new(vec![], 2, 3);
        assert!(validate_chunk(2, &empty_middle).is_ok());

        let beyond = Chunk::new(vec![], 4, 3);
        assert!(matches!(
            validate_chunk(4, &beyond),
            Err(TransportError::BeyondTotal { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_freezes_processed() {
        let manager = thread_manager(test_config());
        let chunks = make_chunks(&[100, 100, 100, 100, 100]);
        manager.submit("c", chunks[0].clone()).await.unwrap();
        let mut rx = manager.subscribe("c").unwrap();
        manager.submit("c", chunks[1].clone()).await.unwrap();

        // wait for both chunks to be reflected
        tokio::time::timeout(Duration::from_secs(10), async {
            while manager.status("c").unwrap().processed < 200 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        manager.cancel("c").unwrap();
        let events = drain(&mut rx).await;
        let last = events.last().unwrap();
        assert_eq!(last.phase, Phase::Cancelled);
        assert!(last.processed <= 200);
        assert!(events.iter().all(|e| e.processed <= 200));

        assert!(manager.submit("c", chunks[2].clone()).await.is_err());
        assert!(matches!(manager.cancel("c"), Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_all_malformed_chunk_fails_session() {
        let manager = thread_manager(test_config());
        let mut chunks = make_chunks(&[5, 5]);
        for p in &mut chunks[1].points {
            p.location = None;
        }
        manager.submit("m", chunks[0].clone()).await.unwrap();
        let mut rx = manager.subscribe("m").unwrap();
        manager.submit("m", chunks[1].clone()).await.unwrap();

        let last = drain(&mut rx).await.pop().unwrap();
        assert_eq!(last.phase, Phase::Error);
        let failure = last.error.unwrap();
        assert_eq!(failure.kind, ErrorKind::Transport);
        assert!(failure.message.contains("malformed"));
        assert!(manager.summary("m").is_err());
    }

    #[tokio::test]
    async fn test_result_not_ready_while_active() {
        let manager = thread_manager(test_config());
        manager.open("r", SessionOptions::default()).unwrap();
        assert!(matches!(
            manager.fetch("r", 0, 10),
            Err(SessionError::NotReady { state: SessionState::Idle, .. })
        ));
        assert!(matches!(
            manager.open("r", SessionOptions::default()),
            Err(SessionError::AlreadyExists(_))
        ));
        assert!(manager.subscribe("r").is_ok());
        assert!(matches!(
            manager.subscribe("r"),
            Err(SessionError::AlreadySubscribed(_))
        ));
    }

    #[tokio::test]
    async fn test_sessions_queue_behind_small_pool() {
        let manager = thread_manager(PipelineConfig {
            worker_pool_size: 1,
            ..test_config()
        });
        let mut receivers = Vec::new();
        for id in ["a", "b", "c"] {
            manager
                .open(
                    id,
                    SessionOptions {
                        total_expected_points: Some(60),
                        sample_cap: Some(20),
                    },
                )
                .unwrap();
            receivers.push(manager.subscribe(id).unwrap());
        }
        for id in ["a", "b", "c"] {
            for chunk in make_chunks(&[30, 30]) {
                manager.submit(id, chunk).await.unwrap();
            }
        }
        for rx in &mut receivers {
            assert_eq!(drain(rx).await.last().unwrap().phase, Phase::Complete);
        }
        for id in ["a", "b", "c"] {
            let summary = manager.summary(id).unwrap();
            assert_eq!(summary.stats.total_processed, 60);
            assert_eq!(summary.meta.sample_size, 20);
        }
    }

    #[tokio::test]
    async fn test_cancel_completed_session_discards_result() {
        let manager = thread_manager(test_config());
        manager.open("d", SessionOptions::default()).unwrap();
        let mut rx = manager.subscribe("d").unwrap();
        manager.submit("d", make_chunks(&[3]).remove(0)).await.unwrap();
        drain(&mut rx).await;
        manager.cancel("d").unwrap();
        assert!(matches!(manager.summary("d"), Err(SessionError::NotFound(_))));
    }
}
