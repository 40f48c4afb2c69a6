//! Background command worker.
//!
//! Each panel owns one `CommandWorker`. A worker runs a single request at a time on the
//! tokio runtime and reports the outcome to the controller as `Event::CommandFinished`.
//! It never queues: `start()` while a command is running fails with `WorkerError::Busy`.
//!
//! Every `start()` bumps a generation counter. The delivery task only emits if its
//! generation is still current and the worker is still running, so a stopped command
//! never reports back, even if its process exits after `stop()`.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::events::Event;
use crate::invoker::ProcessInvoker;
use crate::panels::PanelKind;
use crate::process::{CommandRequest, CommandResult, WorkerStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    #[error("busy: a command is already running")]
    Busy,
    #[error("no command configured")]
    NotConfigured,
}

/// Maps a command name to the process work it performs.
#[async_trait]
pub trait CommandTable: Send + Sync {
    async fn dispatch(&self, request: &CommandRequest, invoker: &ProcessInvoker) -> CommandResult;
}

#[derive(Debug, Default)]
struct Shared {
    status: WorkerStatus,
    generation: u64,
}

pub struct CommandWorker {
    panel: PanelKind,
    table: Arc<dyn CommandTable>,
    invoker: Arc<ProcessInvoker>,
    shared: Arc<Mutex<Shared>>,
    pending: Option<CommandRequest>,
    running: Option<AbortHandle>,
    event_tx: mpsc::Sender<Event>,
}

impl fmt::Debug for CommandWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandWorker")
            .field("panel", &self.panel)
            .field("status", &self.status())
            .field("pid", &self.invoker.current_pid())
            .field("pending", &self.pending)
            .finish()
    }
}

impl CommandWorker {
    pub fn new(
        panel: PanelKind,
        table: Arc<dyn CommandTable>,
        invoker: ProcessInvoker,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            panel,
            table,
            invoker: Arc::new(invoker),
            shared: Arc::new(Mutex::new(Shared::default())),
            pending: None,
            running: None,
            event_tx,
        }
    }

    pub fn status(&self) -> WorkerStatus {
        lock(&self.shared).status
    }

    pub fn is_busy(&self) -> bool {
        self.status() == WorkerStatus::Running
    }

    /// Stores the request for the next `start()`, replacing any earlier one.
    pub fn configure(&mut self, request: CommandRequest) {
        self.pending = Some(request);
    }

    /// Runs the configured request in the background.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        let generation = {
            let mut shared = lock(&self.shared);
            if shared.status == WorkerStatus::Running {
                return Err(WorkerError::Busy);
            }
            if self.pending.is_none() {
                return Err(WorkerError::NotConfigured);
            }
            shared.status = WorkerStatus::Running;
            shared.generation += 1;
            shared.generation
        };
        let Some(request) = self.pending.take() else {
            return Err(WorkerError::NotConfigured);
        };
        log::debug!("{}: starting {} {:?}", self.panel, request.name, request.args);

        let table = self.table.clone();
        let invoker = self.invoker.clone();
        let job_request = request.clone();
        let job = tokio::spawn(async move { table.dispatch(&job_request, &invoker).await });
        self.running = Some(job.abort_handle());

        let shared = self.shared.clone();
        let tx = self.event_tx.clone();
        let panel = self.panel;
        tokio::spawn(async move {
            let result = match job.await {
                Ok(result) => result,
                Err(err) if err.is_cancelled() => return,
                Err(err) => {
                    log::error!("{}: {} panicked: {}", panel, request.name, err);
                    CommandResult::failure(format!("Error: {} failed unexpectedly", request.name))
                }
            };
            {
                let mut shared = lock(&shared);
                if shared.generation != generation || shared.status != WorkerStatus::Running {
                    log::debug!("{}: dropping result of cancelled {}", panel, request.name);
                    return;
                }
                shared.status = WorkerStatus::Idle;
            }
            log::debug!(
                "{}: {} finished ({})",
                panel,
                request.name,
                if result.success { "ok" } else { "failed" }
            );
            let _ = tx
                .send(Event::CommandFinished {
                    panel,
                    request,
                    result,
                })
                .await;
        });
        Ok(())
    }

    /// Cancels the running command. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        {
            let mut shared = lock(&self.shared);
            if shared.status != WorkerStatus::Running {
                return false;
            }
            shared.status = WorkerStatus::Cancelled;
        }
        log::info!("{}: stopping command", self.panel);
        self.invoker.terminate();
        if let Some(job) = self.running.take() {
            job.abort();
        }
        true
    }
}

impl Drop for CommandWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
