// Process execution model - one worker child per session, framed over its stdio
use crate::application::aggregation::{ChunkReport, SessionPlan};
use crate::application::errors::{ExecutionError, ResultReadError, SessionError};
use crate::application::execution::{ExecutionBackend, ExecutionUnit};
use crate::domain::point::Chunk;
use crate::domain::result::ProcessingResult;
use crate::infrastructure::config::PipelineConfig;
use crate::infrastructure::framing::{WorkerCommand, WorkerReply, read_frame, write_frame};
use crate::infrastructure::worker::WORKER_ARG;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Name of the result artifact inside a session's temp directory
pub const RESULT_FILE: &str = "result.json";

/// How long a worker gets to exit on its own before it is killed
const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ProcessBackend {
    binary: PathBuf,
    temp_dir: PathBuf,
}

impl ProcessBackend {
    pub fn new(binary: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> io::Result<Self> {
        Ok(Self::new(
            config.resolved_worker_binary()?,
            config.resolved_temp_dir(),
        ))
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn launch(&self, plan: SessionPlan) -> Result<Box<dyn ExecutionUnit>, SessionError> {
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(ExecutionError::Io)?;
        let workspace = tempfile::Builder::new()
            .prefix(&format!("geo-stream-{}-", sanitize(&plan.request_id)))
            .tempdir_in(&self.temp_dir)
            .map_err(ExecutionError::Io)?;
        let output = workspace.path().join(RESULT_FILE);

        // the workspace is dropped, and removed, if the spawn fails
        let mut child = Command::new(&self.binary)
            .arg(WORKER_ARG)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;
        debug!(
            request_id = %plan.request_id,
            pid = child.id(),
            workspace = %workspace.path().display(),
            "Worker process spawned"
        );

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (Some(stdin), Some(stdout)) = (stdin, stdout) else {
            return Err(ExecutionError::Protocol("worker stdio unavailable".into()).into());
        };
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_end(&mut buf).await;
            }
            String::from_utf8_lossy(&buf).trim().to_string()
        });

        let mut unit = ProcessUnit {
            request_id: plan.request_id.clone(),
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            stderr: Some(stderr_task),
            output: output.clone(),
            workspace: Some(workspace),
        };
        if let Err(e) = unit.send(&WorkerCommand::Start { plan, output }).await {
            unit.terminate().await;
            return Err(e);
        }
        Ok(Box::new(unit))
    }
}

pub struct ProcessUnit {
    request_id: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    output: PathBuf,
    workspace: Option<TempDir>,
}

impl ProcessUnit {
    async fn send(&mut self, command: &WorkerCommand) -> Result<(), SessionError> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ExecutionError::Protocol("worker input already closed".into()).into());
        };
        match write_frame(stdin, command).await {
            Ok(()) => Ok(()),
            Err(e) => Err(self.exit_error(e).await),
        }
    }

    async fn recv(&mut self) -> Result<WorkerReply, SessionError> {
        match read_frame(&mut self.stdout).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => {
                let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "worker closed its output");
                Err(self.exit_error(eof).await)
            }
            Err(e) => Err(self.exit_error(e).await),
        }
    }

    /// Explain a broken pipe by the worker's exit status and stderr
    async fn exit_error(&mut self, cause: io::Error) -> SessionError {
        self.stdin = None;
        let status = match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = self.child.start_kill();
                self.child.wait().await
            }
        };
        let stderr = self.collect_stderr().await;
        match status {
            Ok(status) if !status.success() => ExecutionError::Exited {
                status: status.to_string(),
                stderr,
            },
            Ok(_) => ExecutionError::Protocol(format!("worker stopped responding: {cause}")),
            Err(e) => ExecutionError::Io(e),
        }
        .into()
    }

    async fn collect_stderr(&mut self) -> String {
        let Some(task) = self.stderr.take() else {
            return String::new();
        };
        match tokio::time::timeout(EXIT_GRACE, task).await {
            Ok(Ok(stderr)) => stderr,
            _ => String::new(),
        }
    }

    fn discard_workspace(&mut self) {
        if let Some(workspace) = self.workspace.take() {
            let path = workspace.path().to_path_buf();
            if let Err(e) = workspace.close() {
                warn!(request_id = %self.request_id, path = %path.display(), error = %e, "Failed to remove worker workspace");
            }
        }
    }
}

#[async_trait]
impl ExecutionUnit for ProcessUnit {
    async fn apply(&mut self, chunk: Chunk) -> Result<ChunkReport, SessionError> {
        self.send(&WorkerCommand::Chunk { chunk }).await?;
        match self.recv().await? {
            WorkerReply::Applied { report } => Ok(report),
            WorkerReply::Rejected { message } => Err(SessionError::Aborted(message)),
            WorkerReply::Finished => {
                Err(ExecutionError::Protocol("worker finished before the final chunk".into()).into())
            }
        }
    }

    async fn finish(&mut self) -> Result<ProcessingResult, SessionError> {
        self.send(&WorkerCommand::Finish).await?;
        match self.recv().await? {
            WorkerReply::Finished => {}
            other => {
                return Err(
                    ExecutionError::Protocol(format!("expected finished, got {other:?}")).into(),
                );
            }
        }

        self.stdin = None;
        let status = self.child.wait().await.map_err(ExecutionError::Io)?;
        if !status.success() {
            let stderr = self.collect_stderr().await;
            return Err(ExecutionError::Exited {
                status: status.to_string(),
                stderr,
            }
            .into());
        }

        let result = read_result(&self.output).await;
        self.discard_workspace();
        Ok(result?)
    }

    async fn terminate(&mut self) {
        self.stdin = None;
        if let Err(e) = self.child.start_kill() {
            debug!(request_id = %self.request_id, error = %e, "Worker already exited");
        }
        let _ = self.child.wait().await;
        if let Some(task) = self.stderr.take() {
            task.abort();
        }
        self.discard_workspace();
    }
}

async fn read_result(path: &Path) -> Result<ProcessingResult, ResultReadError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ResultReadError::Missing(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ResultReadError::Unparseable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };
    serde_json::from_slice(&bytes).map_err(|e| ResultReadError::Unparseable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Keep request ids safe for use in a directory name
fn sanitize(request_id: &str) -> String {
    request_id
        .chars()
        .take(32)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
