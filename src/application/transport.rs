// Chunk transport adapter - pulls chunks from a producer and feeds a session
use crate::application::errors::SessionError;
use crate::application::session_manager::{SessionManager, SessionOptions};
use crate::domain::point::Chunk;
use async_trait::async_trait;
use tracing::{debug, info};

/// An ordered producer of chunks for one request
#[async_trait]
pub trait ChunkSource: Send {
    /// Total point count, when the producer knows it before streaming
    fn total_points(&self) -> Option<u64>;

    /// Next chunk in sequence order, `None` once the stream is exhausted
    async fn next_chunk(&mut self) -> anyhow::Result<Option<Chunk>>;
}

/// Stream every chunk of `source` into the session, opening it first when
/// needed. Returns the number of chunks submitted.
pub async fn pump<S>(
    manager: &SessionManager,
    request_id: &str,
    mut source: S,
    sample_cap: Option<usize>,
) -> Result<u32, SessionError>
where
    S: ChunkSource,
{
    let options = SessionOptions {
        total_expected_points: source.total_points(),
        sample_cap,
    };
    match manager.open(request_id, options) {
        Ok(()) | Err(SessionError::AlreadyExists(_)) => {}
        Err(e) => return Err(e),
    }

    let mut submitted = 0;
    loop {
        let chunk = match source.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                let reason = format!("chunk source failed: {e:#}");
                manager.abort(request_id, &reason);
                return Err(SessionError::Aborted(reason));
            }
        };
        debug!(request_id, sequence = chunk.sequence, "Pumping chunk");
        manager.submit(request_id, chunk).await?;
        submitted += 1;
    }

    info!(request_id, submitted, "Chunk source exhausted");
    Ok(submitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::aggregation::tests::make_chunks;
    use crate::application::execution::ThreadPoolBackend;
    use crate::application::session_manager::tests::{drain, test_config};
    use crate::domain::progress::{ErrorKind, Phase};
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct VecSource {
        chunks: VecDeque<Chunk>,
        fail_after: Option<usize>,
        total: Option<u64>,
    }

    #[async_trait]
    impl ChunkSource for VecSource {
        fn total_points(&self) -> Option<u64> {
            self.total
        }

        async fn next_chunk(&mut self) -> anyhow::Result<Option<Chunk>> {
            if let Some(n) = self.fail_after {
                if n == 0 {
                    anyhow::bail!("connection reset");
                }
                self.fail_after = Some(n - 1);
            }
            Ok(self.chunks.pop_front())
        }
    }

    #[tokio::test]
    async fn test_pump_feeds_whole_source() {
        let manager = SessionManager::new(Arc::new(ThreadPoolBackend), test_config());
        manager.open("p", SessionOptions::default()).unwrap();
        let mut rx = manager.subscribe("p").unwrap();

        let source = VecSource {
            chunks: make_chunks(&[500, 500, 500]).into(),
            fail_after: None,
            total: Some(1500),
        };
        assert_eq!(pump(&manager, "p", source, None).await.unwrap(), 3);
        assert_eq!(drain(&mut rx).await.last().unwrap().phase, Phase::Complete);
        // opened before the pump, so the declared total did not apply
        assert_eq!(manager.summary("p").unwrap().stats.total_processed, 1500);
    }

    #[tokio::test]
    async fn test_source_failure_aborts_session() {
        let manager = SessionManager::new(Arc::new(ThreadPoolBackend), test_config());
        manager.open("f", SessionOptions::default()).unwrap();
        let mut rx = manager.subscribe("f").unwrap();

        let source = VecSource {
            chunks: make_chunks(&[5, 5, 5]).into(),
            fail_after: Some(1),
            total: None,
        };
        let err = pump(&manager, "f", source, None).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));

        let last = drain(&mut rx).await.pop().unwrap();
        assert_eq!(last.phase, Phase::Error);
        assert_eq!(last.error.unwrap().kind, ErrorKind::Transport);
        assert_eq!(manager.active_sessions(), 0);
    }
}
