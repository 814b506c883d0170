//! Worker-side request loop.
//!
//! Reads [`Inbound`] frames, serves each one on a [`LocalWorker`], and writes
//! event frames followed by a single reply frame. Used by the `qbridge
//! worker` subcommand with stdin/stdout; tests drive it over in-memory
//! pipes.

use std::sync::Arc;

use qbridge_proto::{
    FaultKind, Inbound, Outbound, Response, WorkerFault, decode_frame, encode_frame,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::error::{WorkerError, WorkerResult};
use crate::local::{DEFAULT_EVENT_BUFFER, LocalWorker};
use crate::worker::{EventSink, Worker};

/// Serve requests until `reader` reaches end of input.
///
/// Returns the number of requests answered.
pub async fn serve<R, W>(engine: Arc<dyn Engine>, reader: R, mut writer: W) -> WorkerResult<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut worker = LocalWorker::new(Arc::clone(&engine));
    let mut lines = reader.lines();
    let mut served = 0;

    info!("Worker serving engine '{}'", engine.name());

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Inbound { id, request } = match decode_frame::<Inbound>(&line) {
            Ok(frame) => frame,
            Err(e) => {
                let Some(id) = frame_id(&line) else {
                    warn!("Dropping frame without id: {}", e);
                    continue;
                };
                let response = Response::Failed {
                    error: WorkerFault::new(FaultKind::InvalidRequest, e.to_string()),
                };
                write_frame(&mut writer, &Outbound::Reply { id, response }).await?;
                served += 1;
                continue;
            }
        };

        debug!("Serving request {} ({})", id, request.kind().as_str());

        let (tx, mut rx) = mpsc::channel(DEFAULT_EVENT_BUFFER);
        let result = {
            let call = worker.call(request, EventSink::channel(tx));
            tokio::pin!(call);
            loop {
                tokio::select! {
                    Some(event) = rx.recv() => {
                        write_frame(&mut writer, &Outbound::Event { id, event }).await?;
                    }
                    result = &mut call => break result,
                }
            }
        };
        while let Ok(event) = rx.try_recv() {
            write_frame(&mut writer, &Outbound::Event { id, event }).await?;
        }

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Request {} failed inside worker: {}", id, e);
                Response::Failed {
                    error: WorkerFault::new(FaultKind::Runtime, e.to_string()),
                }
            }
        };
        write_frame(&mut writer, &Outbound::Reply { id, response }).await?;
        served += 1;
    }

    info!("Input closed after {} requests", served);
    Ok(served)
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Outbound) -> WorkerResult<()> {
    let mut line = encode_frame(frame).map_err(WorkerError::from)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Best-effort id recovery from a frame that failed schema validation.
fn frame_id(line: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()?
        .get("id")?
        .as_u64()
}
