//! Command dispatcher.
//!
//! Every command follows the same shape:
//!
//! ```text
//!   resolve document ──→ acquire worker ──→ issue request ──→ display
//!          │                                      │
//!          └─ NoActiveDocument                    └─ timeout / failure
//!             (nothing acquired)                     (worker terminated)
//!
//!   release worker  ← on every path after acquire
//! ```
//!
//! Panels are owned by the dispatcher. Commands take `&mut self`, so one
//! command runs at a time and the latest write to a panel wins.

use qbridge_proto::{
    Diagnostic, OperationInfo, OperationSummary, ProtoError, Request, Response, TargetProfile,
};
use qbridge_worker::{DEFAULT_EVENT_BUFFER, EventSink, WorkerError, WorkerHandle, WorkerPool};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::aggregator::{EventAggregator, Histogram, RefreshPolicy};
use crate::display::{CircuitResult, DisplayMessage, DisplayPanel};
use crate::document::DocumentProvider;
use crate::error::{DispatchError, DispatchResult};
use crate::lens::{CodeLens, code_lenses};

/// Knobs shared by all commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub refresh: RefreshPolicy,
    /// Capacity of the run-event channel.
    pub event_buffer: usize,
    pub profile: TargetProfile,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            refresh: RefreshPolicy::default(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            profile: TargetProfile::default(),
        }
    }
}

/// Outcome of a check: diagnostics plus the operations found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub diagnostics: Vec<Diagnostic>,
    pub operations: Vec<OperationSummary>,
}

impl CheckReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Actions available for the checked document.
    pub fn lenses(&self) -> Vec<CodeLens> {
        code_lenses(&self.operations)
    }
}

/// Maps user commands onto worker requests and display updates.
#[derive(Debug)]
pub struct CommandDispatcher {
    pool: WorkerPool,
    histogram_panel: DisplayPanel,
    circuit_panel: DisplayPanel,
    config: DispatchConfig,
}

impl CommandDispatcher {
    pub fn new(pool: WorkerPool, histogram_panel: DisplayPanel, circuit_panel: DisplayPanel) -> Self {
        Self {
            pool,
            histogram_panel,
            circuit_panel,
            config: DispatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn histogram_panel(&self) -> &DisplayPanel {
        &self.histogram_panel
    }

    pub fn circuit_panel(&self) -> &DisplayPanel {
        &self.circuit_panel
    }

    /// Close both panels.
    pub fn dispose_panels(&mut self) {
        self.histogram_panel.dispose();
        self.circuit_panel.dispose();
    }

    /// Run the active document's entry point `shots` times and show the
    /// outcome histogram, refreshing the panel while events arrive.
    ///
    /// Failures are posted to the histogram panel as an error message and
    /// returned.
    #[instrument(skip(self, docs, entry))]
    pub async fn run_histogram(
        &mut self,
        docs: &dyn DocumentProvider,
        entry: Option<String>,
        shots: u32,
    ) -> DispatchResult<Histogram> {
        let document = docs
            .active_document()
            .ok_or(DispatchError::NoActiveDocument)?;
        let title = format!("{} histogram", document.stem());
        let request = Request::Run {
            sources: document.sources(),
            entry,
            shots,
            profile: self.config.profile,
        };

        let result = match self.pool.acquire().await {
            Ok(mut handle) => {
                let result = self.stream_run(&mut handle, request, shots).await;
                handle.release().await;
                result
            }
            Err(e) => Err(e.into()),
        };

        result.inspect_err(|err| {
            error!("Histogram run failed: {}", err);
            if let Err(display_err) = self
                .histogram_panel
                .post(&DisplayMessage::error(title, err.to_string()))
            {
                warn!("Could not show error: {}", display_err);
            }
        })
    }

    async fn stream_run(
        &mut self,
        handle: &mut WorkerHandle,
        request: Request,
        shots: u32,
    ) -> DispatchResult<Histogram> {
        let (tx, mut rx) = mpsc::channel(self.config.event_buffer.max(1));
        let mut aggregator = EventAggregator::new(shots, self.config.refresh);

        let reply = {
            let call = handle.issue(request, EventSink::channel(tx));
            tokio::pin!(call);
            loop {
                tokio::select! {
                    biased;
                    reply = &mut call => break reply,
                    Some(event) = rx.recv() => {
                        if aggregator.on_event(event) {
                            self.histogram_panel
                                .post(&DisplayMessage::update(&aggregator.snapshot()))?;
                        }
                    }
                }
            }
        };

        // On timeout or failure the buffered events are discarded.
        let response = reply?;
        while let Ok(event) = rx.try_recv() {
            aggregator.on_event(event);
        }

        if let Response::RunComplete { shots: reported } = response {
            if reported != aggregator.total() {
                warn!(
                    "Worker reported {} shots but {} events were counted",
                    reported,
                    aggregator.total()
                );
            }
        }

        self.histogram_panel
            .post(&DisplayMessage::update(&aggregator.snapshot()))?;
        info!(
            "Run complete: {}/{} shots, {} rejected",
            aggregator.total(),
            shots,
            aggregator.rejected()
        );
        Ok(aggregator.into_histogram())
    }

    /// Build the circuit for the entry point, or for `operation`, and show
    /// it.
    ///
    /// Worker-side problems (including timeouts) produce an error result
    /// that is still posted and returned as `Ok`. Only a missing document
    /// or a broken display is an `Err`.
    #[instrument(skip(self, docs))]
    pub async fn render_circuit(
        &mut self,
        docs: &dyn DocumentProvider,
        operation: Option<OperationInfo>,
    ) -> DispatchResult<CircuitResult> {
        let document = docs
            .active_document()
            .ok_or(DispatchError::NoActiveDocument)?;
        let title = operation
            .as_ref()
            .map(OperationInfo::qualified)
            .unwrap_or_else(|| document.stem().to_string());
        let subtitle = format!("{} ({} profile)", document.name, self.config.profile);
        let request = Request::Circuit {
            sources: document.sources(),
            profile: self.config.profile,
            operation,
        };

        let reply = match self.pool.acquire().await {
            Ok(mut handle) => {
                let reply = handle.issue(request, EventSink::none()).await;
                handle.release().await;
                reply
            }
            Err(e) => Err(e),
        };

        let result = match reply {
            Ok(Response::Circuit { circuit }) => {
                debug!("Circuit has {} operations", circuit.num_leaf_ops());
                CircuitResult::circuit(title, subtitle, circuit)
            }
            Ok(other) => CircuitResult::error(
                title,
                subtitle,
                format!("Unexpected '{}' reply", other.kind_name()),
            ),
            Err(e) => {
                let err = DispatchError::from(e);
                warn!("Circuit render failed: {}", err);
                CircuitResult::error(title, subtitle, err.to_string())
            }
        };

        self.circuit_panel
            .post(&DisplayMessage::Circuit(result.clone()))?;
        Ok(result)
    }

    /// Compile the active document and list its diagnostics and operations.
    ///
    /// Compile problems are diagnostics in the report. Worker failures
    /// (timeouts, crashes, no free slot) are posted to the histogram panel
    /// as an error message and returned.
    #[instrument(skip(self, docs))]
    pub async fn check(&mut self, docs: &dyn DocumentProvider) -> DispatchResult<CheckReport> {
        let document = docs
            .active_document()
            .ok_or(DispatchError::NoActiveDocument)?;
        let title = format!("{} check", document.stem());
        let request = Request::Check {
            sources: document.sources(),
            profile: self.config.profile,
        };

        let reply = match self.pool.acquire().await {
            Ok(mut handle) => {
                let reply = handle.issue(request, EventSink::none()).await;
                handle.release().await;
                reply
            }
            Err(e) => Err(e),
        };

        Self::check_report(reply.map_err(DispatchError::from)).inspect_err(|err| {
            error!("Check failed: {}", err);
            if let Err(display_err) = self
                .histogram_panel
                .post(&DisplayMessage::error(title, err.to_string()))
            {
                warn!("Could not show error: {}", display_err);
            }
        })
    }

    fn check_report(reply: DispatchResult<Response>) -> DispatchResult<CheckReport> {
        match reply? {
            Response::Checked {
                diagnostics,
                operations,
            } => {
                debug!(
                    "Check found {} diagnostics, {} operations",
                    diagnostics.len(),
                    operations.len()
                );
                Ok(CheckReport {
                    diagnostics,
                    operations,
                })
            }
            other => Err(DispatchError::Worker(WorkerError::Protocol(
                ProtoError::UnexpectedReply {
                    request: "check",
                    got: other.kind_name(),
                },
            ))),
        }
    }
}
