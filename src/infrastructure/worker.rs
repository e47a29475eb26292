// Worker process entry - runs one session's aggregation over stdin/stdout frames
use crate::application::aggregation::Aggregator;
use crate::infrastructure::framing::{WorkerCommand, WorkerReply, read_frame, write_frame};
use anyhow::{Context, bail};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// First CLI argument selecting worker mode
pub const WORKER_ARG: &str = "worker";

/// Serve the session protocol on the process's standard streams
pub async fn run() -> anyhow::Result<()> {
    serve(tokio::io::stdin(), tokio::io::stdout()).await
}

/// Expects `start`, then chunks, then `finish`. The result is written to the
/// path given in `start` before `finished` is acknowledged.
pub async fn serve<R, W>(mut input: R, mut output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let (plan, result_path) = match read_frame(&mut input).await? {
        Some(WorkerCommand::Start { plan, output }) => (plan, output),
        Some(other) => bail!("expected start command, got {other:?}"),
        None => bail!("input closed before start command"),
    };
    let mut aggregator = Aggregator::new(plan);
    let request_id = aggregator.plan().request_id.clone();
    debug!(request_id = %request_id, "Worker session started");

    loop {
        match read_frame(&mut input).await? {
            Some(WorkerCommand::Chunk { chunk }) => match aggregator.apply_chunk(&chunk) {
                Ok(report) => {
                    write_frame(&mut output, &WorkerReply::Applied { report }).await?;
                }
                Err(e) => {
                    let message = e.to_string();
                    write_frame(&mut output, &WorkerReply::Rejected { message: message.clone() })
                        .await?;
                    bail!(message);
                }
            },
            Some(WorkerCommand::Finish) => break,
            Some(WorkerCommand::Start { .. }) => bail!("duplicate start command"),
            None => bail!("input closed before finish command"),
        }
    }

    debug!(
        request_id = %request_id,
        processed = aggregator.stats().count,
        sample = aggregator.sample_len(),
        "Worker finalizing"
    );
    let result = aggregator.finalize();
    let json = serde_json::to_vec(&result).context("failed to encode result")?;
    tokio::fs::write(&result_path, json)
        .await
        .with_context(|| format!("failed to write result to {}", result_path.display()))?;
    write_frame(&mut output, &WorkerReply::Finished).await?;
    Ok(())
}
