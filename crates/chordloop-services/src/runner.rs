//! Background thread that drives an instrument against wall-clock time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver};
use thiserror::Error;
use tracing::{debug, error, info};

use chordloop_core::{Instrument, Trigger};

use crate::sink::TriggerSink;

/// How often the runner wakes to advance the clock
const DEFAULT_TICK: Duration = Duration::from_millis(5);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Transport runner already running")]
    AlreadyRunning,
    #[error("Transport runner not running")]
    NotRunning,
    #[error("Failed to spawn runner thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Advances a shared [`Instrument`] on its own thread and forwards every
/// trigger to a sink. UI code edits the instrument through
/// [`TransportRunner::with_instrument`] while it runs.
pub struct TransportRunner {
    instrument: Arc<Mutex<Instrument>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    tick: Duration,
}

impl TransportRunner {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument: Arc::new(Mutex::new(instrument)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.max(Duration::from_millis(1));
        self
    }

    pub fn instrument(&self) -> Arc<Mutex<Instrument>> {
        self.instrument.clone()
    }

    pub fn with_instrument<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Instrument) -> R,
    {
        self.instrument.lock().ok().map(|mut i| f(&mut i))
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Start the runner, delivering triggers over a new channel
    pub fn start_channel(&mut self) -> Result<Receiver<Trigger>, RunnerError> {
        let (tx, rx) = unbounded();
        self.start(tx)?;
        Ok(rx)
    }

    pub fn start<S: TriggerSink + 'static>(&mut self, sink: S) -> Result<(), RunnerError> {
        if self.handle.is_some() {
            return Err(RunnerError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);
        let instrument = self.instrument.clone();
        let running = self.running.clone();
        let tick = self.tick;

        let handle = thread::Builder::new()
            .name("chordloop-transport".into())
            .spawn(move || Self::run_loop(instrument, running, sink, tick));

        match handle {
            Ok(handle) => {
                self.handle = Some(handle);
                info!(tick_ms = tick.as_millis() as u64, "Transport runner started");
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    pub fn stop(&mut self) -> Result<(), RunnerError> {
        let handle = self.handle.take().ok_or(RunnerError::NotRunning)?;
        self.running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("Transport runner thread panicked");
        }
        info!("Transport runner stopped");
        Ok(())
    }

    fn run_loop<S: TriggerSink>(
        instrument: Arc<Mutex<Instrument>>,
        running: Arc<AtomicBool>,
        mut sink: S,
        tick: Duration,
    ) {
        let mut last = Instant::now();
        while running.load(Ordering::SeqCst) {
            thread::sleep(tick);
            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f64();
            last = now;

            let triggers = match instrument.lock() {
                Ok(mut instrument) => instrument.advance(dt),
                Err(_) => {
                    error!("Instrument lock poisoned, stopping runner");
                    break;
                }
            };

            for trigger in triggers {
                if !sink.send(trigger) {
                    debug!("Trigger consumer disconnected, stopping runner");
                    running.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }
        running.store(false, Ordering::SeqCst);
    }
}

impl Drop for TransportRunner {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
        }
    }
}
