//! Write path for pingsink
//!
//! Encoded lines are buffered in enqueue order and shipped to the backend in
//! batches:
//! - Reaching the batch size triggers a flush immediately
//! - Otherwise a timer armed on the first buffered line flushes after the
//!   flush interval
//! - At most one payload is in flight; lines arriving meanwhile are drained
//!   in follow-up payloads as soon as the flight completes
//!
//! A failed payload is logged and dropped. There is no retry and no requeue,
//! so a failing backend never stalls the pipeline.

mod buffer;
mod sink;
mod telemetry;

pub use buffer::LineBuffer;
pub use sink::{LineSink, WriteClient};

use crate::config::WriteSettings;
use crate::{Error, Result};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Size,
    Interval,
    Drain,
    Manual,
}

impl FlushTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Interval => "interval",
            Self::Drain => "drain",
            Self::Manual => "manual",
        }
    }
}

/// Armed interval timer. `id` distinguishes a timer that fired after being
/// cancelled from the one currently armed.
struct FlushTimer {
    id: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    lines: LineBuffer,
    in_flight: bool,
    timer: Option<FlushTimer>,
    next_timer_id: u64,
}

impl State {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }
}

#[derive(Default)]
struct Counters {
    flushes: AtomicU64,
    failed_flushes: AtomicU64,
    lines_written: AtomicU64,
    lines_dropped: AtomicU64,
}

struct Shared {
    /// Buffer, flight flag, and timer; never held across an await
    state: Mutex<State>,
    sink: Arc<dyn LineSink>,
    settings: WriteSettings,
    runtime: Handle,
    /// Signalled whenever a drain loop finishes
    idle: Notify,
    counters: Counters,
}

/// Batching write buffer with single-flight flushing
pub struct WriteBuffer {
    shared: Arc<Shared>,
}

impl WriteBuffer {
    /// Create a write buffer flushing into `sink`.
    ///
    /// Must be called from within a tokio runtime; flushes and timers are
    /// spawned onto it.
    pub fn new(sink: Arc<dyn LineSink>, settings: WriteSettings) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            Error::Config("write buffer must be created inside a tokio runtime".to_string())
        })?;

        let settings = WriteSettings {
            batch_size: settings.batch_size.max(1),
            ..settings
        };

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                sink,
                settings,
                runtime,
                idle: Notify::new(),
                counters: Counters::default(),
            }),
        })
    }

    /// Append an encoded line. Never blocks on I/O.
    pub fn enqueue(&self, line: String) {
        self.shared.enqueue(line);
    }

    /// Start a flush of the buffered lines. No-op when a flush is already in
    /// flight or the buffer is empty.
    pub fn flush(&self) {
        self.shared.flush(FlushTrigger::Manual);
    }

    /// Wait until the buffer is empty and no flush is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.state.lock();
                if !state.in_flight && state.lines.is_empty() {
                    return;
                }
            }

            notified.await;
        }
    }

    /// Flush everything buffered and wait for it to leave.
    pub async fn shutdown(&self) {
        self.flush();
        self.wait_idle().await;
    }

    pub fn settings(&self) -> WriteSettings {
        self.shared.settings
    }

    pub fn stats(&self) -> WriteStats {
        let state = self.shared.state.lock();
        let counters = &self.shared.counters;
        WriteStats {
            pending_lines: state.lines.len(),
            pending_bytes: state.lines.size_bytes(),
            in_flight: state.in_flight,
            timer_armed: state.timer.is_some(),
            flushes: counters.flushes.load(Ordering::Relaxed),
            failed_flushes: counters.failed_flushes.load(Ordering::Relaxed),
            lines_written: counters.lines_written.load(Ordering::Relaxed),
            lines_dropped: counters.lines_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Shared {
    fn enqueue(self: &Arc<Self>, line: String) {
        telemetry::record_enqueue();

        let full = {
            let mut state = self.state.lock();
            state.lines.push(line);
            if state.lines.len() >= self.settings.batch_size {
                true
            } else {
                if state.timer.is_none() {
                    self.arm_timer(&mut state);
                }
                false
            }
        };

        if full {
            self.flush(FlushTrigger::Size);
        }
    }

    fn arm_timer(self: &Arc<Self>, state: &mut State) {
        let id = state.next_timer_id;
        state.next_timer_id += 1;

        let shared = Arc::clone(self);
        let delay = self.settings.flush_interval;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let current = {
                let mut state = shared.state.lock();
                if state.timer.as_ref().map(|t| t.id) == Some(id) {
                    state.timer = None;
                    true
                } else {
                    false
                }
            };

            if current {
                shared.flush(FlushTrigger::Interval);
            }
        });

        state.timer = Some(FlushTimer { id, handle });
    }

    fn flush(self: &Arc<Self>, trigger: FlushTrigger) {
        let batch = {
            let mut state = self.state.lock();
            if state.in_flight || state.lines.is_empty() {
                return;
            }
            state.cancel_timer();
            state.in_flight = true;
            state.lines.take_batch(self.settings.batch_size)
        };

        telemetry::record_flush_trigger(trigger.as_str());
        let shared = Arc::clone(self);
        self.runtime.spawn(shared.drain(batch));
    }

    /// Send `batch`, then keep sending whatever accumulated during the flight
    /// until the buffer is empty.
    async fn drain(self: Arc<Self>, mut batch: Vec<String>) {
        loop {
            self.send(batch).await;

            let next = {
                let mut state = self.state.lock();
                if state.lines.is_empty() {
                    state.in_flight = false;
                    None
                } else {
                    state.cancel_timer();
                    Some(state.lines.take_batch(self.settings.batch_size))
                }
            };

            match next {
                Some(next) => {
                    telemetry::record_flush_trigger(FlushTrigger::Drain.as_str());
                    batch = next;
                }
                None => {
                    self.idle.notify_waiters();
                    return;
                }
            }
        }
    }

    async fn send(&self, batch: Vec<String>) {
        let lines = batch.len() as u64;
        let payload = batch.join("\n");
        let bytes = payload.len() as u64;

        let start = Instant::now();
        let result = self.sink.write_lines(payload).await;
        let elapsed = start.elapsed().as_secs_f64();

        self.counters.flushes.fetch_add(1, Ordering::Relaxed);
        match result {
            Ok(()) => {
                self.counters
                    .lines_written
                    .fetch_add(lines, Ordering::Relaxed);
                telemetry::record_flush(elapsed, lines, bytes, "success");
                debug!(lines, bytes, "Flushed lines to InfluxDB");
            }
            Err(e) => {
                self.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .lines_dropped
                    .fetch_add(lines, Ordering::Relaxed);
                telemetry::record_flush(elapsed, lines, bytes, "failure");
                telemetry::record_dropped_lines(lines);
                error!(lines, error = %e, "Failed to write data to InfluxDB; batch dropped");
            }
        }
    }
}

/// Write buffer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub pending_lines: usize,
    pub pending_bytes: usize,
    pub in_flight: bool,
    pub timer_armed: bool,
    pub flushes: u64,
    pub failed_flushes: u64,
    pub lines_written: u64,
    pub lines_dropped: u64,
}
