//! Print and feed-and-cut job state machine.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use crate::error::{PrinterError, Result};
use crate::raster::{LineFeed, RasterJob, encode_job};
use crate::tprt::{ControlClient, DeviceStatus, TapeWidth};
use crate::transport::{DataStream, Transport};

/// Sequencer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    SessionOpening,
    Uploading,
    AwaitingCompletion,
    Closing,
    Done,
    Aborting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::SessionOpening => "session opening",
            Phase::Uploading => "uploading",
            Phase::AwaitingCompletion => "awaiting completion",
            Phase::Closing => "closing",
            Phase::Done => "done",
            Phase::Aborting => "aborting",
        };
        f.write_str(name)
    }
}

/// What the job asks the device to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Print,
    FeedAndCut,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Print => write!(f, "print"),
            JobKind::FeedAndCut => write!(f, "feed-and-cut"),
        }
    }
}

/// Timing and protocol options for one sequencer.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Pause before every status poll.
    pub poll_interval: Duration,
    /// Pause after print-start, connect and session-open.
    pub settle_delay: Duration,
    /// Upper bound on polls for each completion wait.
    pub max_polls: u32,
    /// Send 0x0101/0x0100 before the upload.
    pub session_open: bool,
    pub line_feed: LineFeed,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_millis(500),
            max_polls: 240,
            session_open: true,
            line_feed: LineFeed::NONE,
        }
    }
}

/// Outcome of a job that reached `Done`.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub kind: JobKind,
    pub tape: TapeWidth,
    pub bytes_sent: usize,
    /// Status polls that found the device still busy.
    pub wait_polls: u32,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl JobReport {
    /// Get summary message.
    pub fn summary(&self) -> String {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        format!(
            "{} on {} tape: {} bytes sent, {} wait polls (took {elapsed:.1}s)",
            self.kind, self.tape, self.bytes_sent, self.wait_polls
        )
    }
}

/// Drives one printer through print and feed-and-cut jobs.
///
/// Jobs run strictly one after another; all session state (phase, data
/// stream, poll counter) lives only for the duration of a job.
pub struct JobSequencer<T: Transport> {
    client: ControlClient<T>,
    options: JobOptions,
    phase: Phase,
    cancel: CancelToken,
    progress: Option<mpsc::UnboundedSender<Phase>>,
}

impl<T: Transport> JobSequencer<T> {
    pub fn new(client: ControlClient<T>, options: JobOptions) -> Self {
        Self {
            client,
            options,
            phase: Phase::Idle,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Use `cancel` to interrupt waits.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report every phase transition on `tx`.
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<Phase>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Token that interrupts this sequencer's waits.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn into_client(self) -> ControlClient<T> {
        self.client
    }

    /// Print `job` and wait until the device reports completion.
    pub async fn run_print(&mut self, job: &RasterJob) -> Result<JobReport> {
        let tape = self.preflight().await?;
        let data = encode_job(job, tape, self.options.line_feed)?;
        info!(
            "Printing {} lines x {} dots on {tape} tape",
            job.length_dots(),
            job.width_dots()
        );
        self.execute(JobKind::Print, tape, &data).await
    }

    /// Feed and cut the tape without printing.
    pub async fn run_feed_and_cut(&mut self) -> Result<JobReport> {
        let tape = self.preflight().await?;
        let data = encode_job(&RasterJob::blank(), tape, self.options.line_feed)?;
        info!("Feed and cut on {tape} tape");
        self.execute(JobKind::FeedAndCut, tape, &data).await
    }

    /// Send print-stop again. Does not change the phase.
    pub async fn stop(&mut self) -> Result<()> {
        self.client.stop_print().await
    }

    fn transition(&mut self, phase: Phase) {
        debug!("Job phase: {} -> {phase}", self.phase);
        self.phase = phase;
        if let Some(tx) = &self.progress {
            // Receiver gone means nobody is watching; the job carries on
            let _ = tx.send(phase);
        }
    }

    /// Read status before anything is sent; the tape selects the preamble.
    async fn preflight(&mut self) -> Result<TapeWidth> {
        self.transition(Phase::Idle);
        if self.cancel.is_cancelled() {
            return Err(PrinterError::Cancelled);
        }
        let status = self.client.status().await?;
        Ok(status.tape)
    }

    async fn execute(&mut self, kind: JobKind, tape: TapeWidth, data: &[u8]) -> Result<JobReport> {
        let started_at = Local::now();
        let mut stream = None;

        match self.session(kind, data, &mut stream).await {
            Ok(wait_polls) => {
                self.transition(Phase::Closing);
                let stopped = self.client.stop_print().await;
                close_stream(stream).await;
                stopped?;

                self.transition(Phase::Done);
                let report = JobReport {
                    kind,
                    tape,
                    bytes_sent: data.len(),
                    wait_polls,
                    started_at,
                    finished_at: Local::now(),
                };
                info!("Job done: {}", report.summary());
                Ok(report)
            }
            Err(e) => {
                self.abort(stream, &e).await;
                Err(e)
            }
        }
    }

    /// Everything between print-start and device completion. The stream is
    /// handed back through `stream` so every exit path can close it.
    async fn session(&mut self, kind: JobKind, data: &[u8], stream: &mut Option<T::Stream>) -> Result<u32> {
        self.transition(Phase::SessionOpening);
        self.client.start_print().await?;
        self.cancel.sleep(self.options.settle_delay).await?;

        let opened = self.client.transport_mut().open_stream().await?;
        let stream = stream.insert(opened);
        self.cancel.sleep(self.options.settle_delay).await?;

        if self.options.session_open {
            self.client.open_session().await?;
            self.cancel.sleep(self.options.settle_delay).await?;
        }

        self.transition(Phase::Uploading);
        stream.write_all(data).await?;
        info!("Uploaded {} bytes", data.len());

        self.transition(Phase::AwaitingCompletion);
        match kind {
            JobKind::Print => self.wait_while("print completion", |s| !s.print_complete).await,
            JobKind::FeedAndCut => {
                let starting = self.wait_while("feed start", |s| !s.feeding).await?;
                let feeding = self.wait_while("feed end", |s| s.feeding).await?;
                Ok(starting + feeding)
            }
        }
    }

    /// Poll status until `busy` turns false; returns the number of busy polls.
    async fn wait_while(&mut self, what: &str, busy: impl Fn(&DeviceStatus) -> bool) -> Result<u32> {
        for poll in 0..self.options.max_polls {
            self.cancel.sleep(self.options.poll_interval).await?;
            let status = self.client.status().await?;
            if !busy(&status) {
                debug!("Reached {what} after {poll} busy polls");
                return Ok(poll);
            }
            debug!("Waiting for {what} (poll {})", poll + 1);
        }

        Err(PrinterError::timeout(format!(
            "No {what} after {} polls",
            self.options.max_polls
        )))
    }

    async fn abort(&mut self, stream: Option<T::Stream>, error: &PrinterError) {
        self.transition(Phase::Aborting);
        warn!("Aborting job: {error}");

        if let Err(e) = self.client.stop_print().await {
            warn!("print-stop during abort failed: {e}");
        }
        close_stream(stream).await;
    }
}

async fn close_stream<S: DataStream>(stream: Option<S>) {
    if let Some(mut stream) = stream {
        if let Err(e) = stream.close().await {
            warn!("Failed to close data stream: {e}");
        }
    }
}
