//! Repeating sort cycle: pass, countdown, pass, ... until stopped.
//!
//! The controller owns a single worker thread, so two passes never overlap.
//! Cancellation is generation based: `start` and `stop` are the only writers
//! of the generation counter, and the worker checks it under the same lock
//! before every state change and every observer callback. Once `stop` has
//! returned, no tick or status from the old cycle can reach the observer.

use crate::config::{self, ConfigError};
use crate::routing_rule::RuleSet;
use crate::rule_engine::{PassOptions, PassSummary, RuleEngine};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Where the controller currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
    CountingDown,
}

/// Status line reported to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Started,
    Completed(PassSummary),
    Failed(String),
    Stopped,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::Started => write!(f, "Sorting started..."),
            StatusMessage::Completed(_) => write!(f, "Sorting completed."),
            StatusMessage::Failed(cause) => write!(f, "Error: {}", cause),
            StatusMessage::Stopped => write!(f, "Sorting stopped."),
        }
    }
}

/// Countdown line reported to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownMessage {
    Remaining(u32),
    Halted,
}

impl fmt::Display for CountdownMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountdownMessage::Remaining(seconds) => write!(f, "Next run in {} seconds...", seconds),
            CountdownMessage::Halted => write!(f, "Sorting halted."),
        }
    }
}

/// Receives everything a cycle has to say.
///
/// Callbacks run on the controller's worker thread (or on the thread calling
/// `start`/`stop`) while the controller's state lock is held, so they must
/// not call back into the controller.
pub trait CycleObserver: Send + Sync {
    fn on_status(&self, status: &StatusMessage);
    fn on_countdown_tick(&self, countdown: &CountdownMessage);
}

/// Timing and pass behaviour of a cycle.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    /// Ticks counted down between two passes.
    pub interval_ticks: u32,
    /// Length of one tick.
    pub tick: Duration,
    pub pass_options: PassOptions,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            interval_ticks: config::DEFAULT_INTERVAL,
            tick: Duration::from_secs(1),
            pass_options: PassOptions::default(),
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: CycleState,
    generation: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: Sender<()>,
    observer: Arc<dyn CycleObserver>,
}

/// Drives repeated passes of the [`RuleEngine`] over one directory.
pub struct CycleController {
    settings: CycleSettings,
    shared: Arc<Mutex<Shared>>,
    worker: Option<Worker>,
}

impl CycleController {
    pub fn new(settings: CycleSettings) -> Self {
        Self {
            settings,
            shared: Arc::new(Mutex::new(Shared {
                state: CycleState::Idle,
                generation: 0,
            })),
            worker: None,
        }
    }

    pub fn settings(&self) -> &CycleSettings {
        &self.settings
    }

    pub fn state(&self) -> CycleState {
        lock(&self.shared).state
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Validates the configuration and starts a new cycle.
    ///
    /// A cycle that is already running is replaced. The first pass runs
    /// right away on the worker thread.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if `target` is not an existing directory or
    /// no rule names a destination folder. Nothing is started in that case
    /// and a running cycle is left alone.
    pub fn start(
        &mut self,
        target: &Path,
        rules: RuleSet,
        observer: Arc<dyn CycleObserver>,
    ) -> Result<(), ConfigError> {
        if self.settings.interval_ticks == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        config::validate(target, &rules)?;

        self.halt(false);

        let generation = {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = CycleState::Running;
            observer.on_status(&StatusMessage::Started);
            shared.generation
        };

        let (cancel, cancel_rx) = mpsc::channel();
        let context = CycleContext {
            shared: Arc::clone(&self.shared),
            generation,
            target: target.to_path_buf(),
            rules,
            engine: RuleEngine::with_options(self.settings.pass_options),
            observer: Arc::clone(&observer),
            interval_ticks: self.settings.interval_ticks,
            tick: self.settings.tick,
            cancel: cancel_rx,
        };
        let handle = thread::spawn(move || context.run());

        info!(
            "Sorting cycle started on {} every {} ticks",
            target.display(),
            self.settings.interval_ticks
        );
        self.worker = Some(Worker {
            handle,
            cancel,
            observer,
        });
        Ok(())
    }

    /// Stops the cycle.
    ///
    /// No further pass or tick fires once this returns. A pass that is
    /// already running finishes, but its result is not reported. Returns
    /// false if no cycle was running.
    pub fn stop(&mut self) -> bool {
        self.halt(true)
    }

    fn halt(&mut self, announce: bool) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };

        {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.state = CycleState::Idle;
            if announce {
                worker.observer.on_status(&StatusMessage::Stopped);
                worker.observer.on_countdown_tick(&CountdownMessage::Halted);
            }
        }

        // The worker may already be gone if an observer panicked.
        let _ = worker.cancel.send(());
        if worker.handle.join().is_err() {
            error!("Sorting cycle worker panicked");
        }

        info!("Sorting cycle stopped");
        true
    }
}

impl Default for CycleController {
    fn default() -> Self {
        Self::new(CycleSettings::default())
    }
}

impl Drop for CycleController {
    fn drop(&mut self) {
        self.halt(false);
    }
}

/// Everything the worker thread owns for one cycle.
struct CycleContext {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    target: PathBuf,
    rules: RuleSet,
    engine: RuleEngine,
    observer: Arc<dyn CycleObserver>,
    interval_ticks: u32,
    tick: Duration,
    cancel: Receiver<()>,
}

impl CycleContext {
    fn run(self) {
        loop {
            if !self.if_current(|_| ()) {
                return;
            }

            let status = match self.engine.run_pass(&self.target, &self.rules) {
                Ok(summary) => StatusMessage::Completed(summary),
                Err(e) => {
                    warn!("Pass failed: {}", e);
                    StatusMessage::Failed(e.to_string())
                }
            };

            if !self.if_current(|observer| observer.on_status(&status)) {
                debug!("Discarding result of a cancelled pass");
                return;
            }

            for remaining in (1..=self.interval_ticks).rev() {
                let tick = CountdownMessage::Remaining(remaining);
                if !self.enter(CycleState::CountingDown, |observer| {
                    observer.on_countdown_tick(&tick)
                }) {
                    return;
                }

                match self.cancel.recv_timeout(self.tick) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            }

            if !self.enter(CycleState::Running, |_| ()) {
                return;
            }
        }
    }

    /// Runs `emit` if this cycle has not been cancelled.
    fn if_current(&self, emit: impl FnOnce(&dyn CycleObserver)) -> bool {
        let shared = lock(&self.shared);
        if shared.generation != self.generation {
            return false;
        }
        emit(self.observer.as_ref());
        true
    }

    /// Moves to `state` and runs `emit` if this cycle has not been cancelled.
    fn enter(&self, state: CycleState, emit: impl FnOnce(&dyn CycleObserver)) -> bool {
        let mut shared = lock(&self.shared);
        if shared.generation != self.generation {
            return false;
        }
        shared.state = state;
        emit(self.observer.as_ref());
        true
    }
}
