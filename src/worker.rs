//! A task that owns one log file and appends the events of its own queue consumer to it.
//!
//! Lifecycle:
//!
//! ```text
//! Idle -> Validating -> Ready -> Draining <-> WaitingForEvents -> ShuttingDown -> Closed
//!             |                                                                   ^
//!             +------------------------ validation failed ------------------------+
//! ```

use crate::error::{FileError, FileErrorKind, KeyloggerError};
use crate::queue::{EventConsumer, EventQueue};
use crate::sink::{SinkDescriptor, SinkHandle};
use crate::status::StatusSink;
use crate::validate::validate;
use crate::KeyloggerResult;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// The state of a [`FileWriterWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Validating,
    Ready,
    Draining,
    WaitingForEvents,
    ShuttingDown,
    Closed,
}

/// Why a writer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown token was cancelled.
    Interrupted,
    /// The queue was closed.
    QueueClosed,
    /// Writing to the file failed.
    WriteFailed,
    /// The writer was aborted before it could close the file.
    Aborted,
}

/// What a writer did before it closed.
#[derive(Debug)]
pub struct SinkReport {
    pub path: PathBuf,
    pub lines_written: u64,
    pub stopped: StopReason,
    /// The error that stopped the writer, if any.
    pub failure: Option<KeyloggerError>,
}

/// Writes the captured events to a single log file.
pub struct FileWriterWorker {
    descriptor: SinkDescriptor,
    status: Arc<dyn StatusSink>,
    state: watch::Sender<WorkerState>,
}

impl FileWriterWorker {
    pub fn new(descriptor: SinkDescriptor, status: Arc<dyn StatusSink>) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);

        Self {
            descriptor,
            status,
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.descriptor.path
    }

    /// Validate the log file and, if it is usable, start writing the events of `queue` to it.
    ///
    /// The consumer is registered before this returns, so every event pushed afterwards ends
    /// up in the file. On validation failure the worker is closed without having touched the
    /// queue.
    pub async fn start(
        self,
        queue: &EventQueue,
        shutdown: CancellationToken,
    ) -> Result<WorkerHandle, FileError> {
        self.state.send_replace(WorkerState::Validating);

        let descriptor = self.descriptor.clone();
        let status = Arc::clone(&self.status);
        let validation = tokio::task::spawn_blocking(move || validate(&descriptor, &*status))
            .await
            .unwrap_or_else(|e| {
                Err(FileError::with_source(
                    FileErrorKind::InUse,
                    &self.descriptor.path,
                    "validation did not complete",
                    io::Error::new(io::ErrorKind::Other, e),
                ))
            });

        if let Err(e) = validation {
            self.state.send_replace(WorkerState::Closed);
            return Err(e);
        }

        let sink = match SinkHandle::open(self.descriptor.clone()).await {
            Ok(sink) => sink,
            Err(e) => {
                self.state.send_replace(WorkerState::Closed);
                return Err(FileError::with_source(
                    FileErrorKind::InUse,
                    &self.descriptor.path,
                    "cannot open file",
                    e,
                ));
            }
        };

        let consumer = queue.subscribe();
        self.state.send_replace(WorkerState::Ready);

        tracing::debug!(path = %self.descriptor.path.display(), "log writer ready");

        let path = self.descriptor.path.clone();
        let state = self.state.subscribe();
        let task = tokio::spawn(self.run(sink, consumer, shutdown));

        Ok(WorkerHandle { path, state, task })
    }

    async fn run(
        self,
        mut sink: SinkHandle,
        mut consumer: EventConsumer,
        shutdown: CancellationToken,
    ) -> SinkReport {
        let (stopped, mut failure) = match self.drain(&mut sink, &mut consumer, &shutdown).await {
            Ok(stopped) => (stopped, None),
            Err(e) => (StopReason::WriteFailed, Some(e)),
        };

        self.state.send_replace(WorkerState::ShuttingDown);
        let path = sink.path().to_path_buf();

        // Whatever already reached this consumer is written out before closing.
        if failure.is_none() {
            let pending = consumer.drain_pending();
            if !pending.is_empty() {
                tracing::debug!(
                    count = pending.len(),
                    path = %path.display(),
                    "writing pending events on shutdown"
                );

                if let Err(e) = sink.append(&pending, &*self.status).await {
                    failure = Some(e);
                }
            }
        }

        let lines_written = sink.lines_written();
        if let Err(e) = sink.close().await {
            failure.get_or_insert(e);
        }

        match &failure {
            Some(e) => self
                .status
                .fatal(0, &format!("Logger for {} stopped: {e}", path.display())),
            None => self
                .status
                .fatal(0, &format!("Shutting down logger for {}", path.display())),
        }

        self.state.send_replace(WorkerState::Closed);

        SinkReport {
            path,
            lines_written,
            stopped: if failure.is_some() {
                StopReason::WriteFailed
            } else {
                stopped
            },
            failure,
        }
    }

    /// Write events until shutdown is requested or the queue is closed.
    async fn drain(
        &self,
        sink: &mut SinkHandle,
        consumer: &mut EventConsumer,
        shutdown: &CancellationToken,
    ) -> KeyloggerResult<StopReason> {
        let poll_interval = sink.descriptor().flush_interval;

        loop {
            if shutdown.is_cancelled() {
                return Ok(StopReason::Interrupted);
            }

            let mut batch = consumer.drain_pending();

            if batch.is_empty() {
                self.state.send_replace(WorkerState::WaitingForEvents);

                let next = tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => return Ok(StopReason::Interrupted),
                    next = tokio::time::timeout(poll_interval, consumer.recv()) => next,
                };

                match next {
                    Ok(Some(ev)) => batch.push(ev),
                    Ok(None) => return Ok(StopReason::QueueClosed),
                    // Idle, check again
                    Err(_elapsed) => continue,
                }

                batch.extend(consumer.drain_pending());
            }

            self.state.send_replace(WorkerState::Draining);
            tracing::trace!(
                count = batch.len(),
                path = %sink.path().display(),
                "writing events"
            );

            sink.append(&batch, &*self.status).await?;
        }
    }
}

/// A running [`FileWriterWorker`].
#[derive(Debug)]
pub struct WorkerHandle {
    path: PathBuf,
    state: watch::Receiver<WorkerState>,
    task: JoinHandle<SinkReport>,
}

impl WorkerHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current state of the worker.
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Wait until the worker reaches `state` (or closes).
    pub async fn wait_for(&mut self, state: WorkerState) -> WorkerState {
        match self
            .state
            .wait_for(|s| *s == state || *s == WorkerState::Closed)
            .await
        {
            Ok(s) => *s,
            Err(_) => WorkerState::Closed,
        }
    }

    /// Wait for the worker to close.
    pub async fn join(self) -> SinkReport {
        let res = self.task.await;
        report(self.path, res)
    }

    /// Wait for the worker to close, or abort it once `abort` is cancelled.
    ///
    /// An aborted worker may leave a partially written batch behind.
    pub async fn join_or_abort(mut self, abort: &CancellationToken) -> SinkReport {
        let res = tokio::select! {
            res = &mut self.task => res,
            _ = abort.cancelled() => {
                tracing::warn!(path = %self.path.display(), "aborting log writer");
                self.task.abort();
                (&mut self.task).await
            }
        };

        report(self.path, res)
    }
}

fn report(path: PathBuf, res: Result<SinkReport, JoinError>) -> SinkReport {
    match res {
        Ok(report) => report,
        Err(e) => SinkReport {
            path,
            lines_written: 0,
            stopped: if e.is_cancelled() {
                StopReason::Aborted
            } else {
                StopReason::WriteFailed
            },
            failure: Some(e.into()),
        },
    }
}
