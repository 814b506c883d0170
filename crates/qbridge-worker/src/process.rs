//! Out-of-process worker speaking JSON lines over stdio.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use qbridge_proto::{Inbound, Outbound, ProtoError, Request, Response, decode_frame, encode_frame};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, instrument, trace};

use crate::error::{WorkerError, WorkerResult};
use crate::worker::{EventSink, Worker, WorkerSpawner};

/// A child process serving requests on its stdin/stdout.
pub struct ProcessWorker {
    name: String,
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    terminated: bool,
}

impl ProcessWorker {
    /// Start `program` with `args` and take over its stdio.
    ///
    /// The child's stderr is inherited so its logs reach the terminal.
    pub fn spawn(program: &Path, args: &[String]) -> WorkerResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Spawn(format!("{}: {e}", program.display())))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Spawn("no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Spawn("no stdout".into()))?;

        let pid = child.id().map_or_else(|| "?".to_string(), |p| p.to_string());
        debug!("Started worker process {} (pid {})", program.display(), pid);

        Ok(Self {
            name: format!("process:{pid}"),
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            terminated: false,
        })
    }

    async fn send(&mut self, frame: &Inbound) -> WorkerResult<()> {
        let mut line = encode_frame(frame)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Worker for ProcessWorker {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(worker = %self.name))]
    async fn call(&mut self, request: Request, events: EventSink) -> WorkerResult<Response> {
        if self.terminated {
            return Err(WorkerError::Terminated);
        }

        let id = self.next_id;
        self.next_id += 1;
        let kind = request.kind();
        let streams = request.streams_events();
        self.send(&Inbound::new(id, request)).await?;

        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or(WorkerError::Disconnected)?;
            if line.trim().is_empty() {
                continue;
            }
            trace!("<- {}", line);

            match decode_frame::<Outbound>(&line)?.expect_id(id)? {
                Outbound::Event { event, .. } => {
                    if !streams {
                        return Err(ProtoError::UnexpectedReply {
                            request: kind.as_str(),
                            got: "event",
                        }
                        .into());
                    }
                    events.deliver(event).await;
                }
                Outbound::Reply { response, .. } => return Ok(response.validate(kind)?),
            }
        }
    }

    async fn terminate(&mut self) -> WorkerResult<()> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        // The child may already have exited on its own.
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        Ok(())
    }

    fn start_kill(&mut self) {
        if !self.terminated {
            self.terminated = true;
            let _ = self.child.start_kill();
        }
    }
}

/// Spawns [`ProcessWorker`]s from a fixed command line.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessSpawner {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    fn describe(&self) -> String {
        format!("{} {}", self.program.display(), self.args.join(" "))
    }

    async fn spawn(&self) -> WorkerResult<Box<dyn Worker>> {
        Ok(Box::new(ProcessWorker::spawn(&self.program, &self.args)?))
    }
}
