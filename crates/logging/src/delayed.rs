//! crates/logging/src/delayed.rs
//! The process-wide root handler that buffers records until handlers exist.
//!
//! # Design
//!
//! The active handler set lives behind an [`ArcSwap`]. A producer loads one
//! snapshot and fans its record out to that snapshot only, so it sees either
//! the complete old set or the complete new one. While nothing is installed
//! records go to a bounded buffer; installing a set replays the buffer into
//! it and swaps the snapshot under the same lock, so buffered records always
//! reach the new handlers before records published after the swap.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use arc_swap::ArcSwap;
use logging_sink::{Handler, HandlerCore, Record, SharedHandler};

/// Number of records kept before the first handler set is installed.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Decides whether a buffered record is still wanted when it is replayed.
pub type ReplayGate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Bootstrap state of the delayed handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No handlers installed; records are buffered.
    #[default]
    Unconfigured,
    /// The minimal build-time set is installed.
    BuildTimeConfigured,
    /// The fully assembled runtime set is installed.
    RuntimeConfigured,
}

impl Phase {
    /// Returns a lower-case label for diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::BuildTimeConfigured => "build-time",
            Self::RuntimeConfigured => "runtime",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct Installed {
    phase: Phase,
    handlers: Vec<SharedHandler>,
}

struct Buffer {
    records: VecDeque<Record>,
    capacity: usize,
}

/// Root handler that buffers early records and forwards to the installed set.
pub struct DelayedHandler {
    core: HandlerCore,
    installed: ArcSwap<Installed>,
    buffer: Mutex<Buffer>,
    dropped: AtomicU64,
    auto_flush: AtomicBool,
    replay_gate: RwLock<Option<ReplayGate>>,
}

impl DelayedHandler {
    /// Creates an unconfigured handler buffering up to
    /// [`DEFAULT_BUFFER_CAPACITY`] records.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Creates an unconfigured handler buffering up to `capacity` records.
    /// The oldest record is dropped when the buffer is full.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            core: HandlerCore::default(),
            installed: ArcSwap::from_pointee(Installed::default()),
            buffer: Mutex::new(Buffer {
                records: VecDeque::new(),
                capacity,
            }),
            dropped: AtomicU64::new(0),
            auto_flush: AtomicBool::new(true),
            replay_gate: RwLock::new(None),
        }
    }

    fn lock_buffer(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.installed.load().phase
    }

    /// Returns the installed handlers.
    pub fn handlers(&self) -> Vec<SharedHandler> {
        self.installed.load().handlers.clone()
    }

    /// Installs the runtime handler set, returning the previous set.
    pub fn set_handlers(&self, handlers: Vec<SharedHandler>) -> Vec<SharedHandler> {
        self.install(Phase::RuntimeConfigured, handlers)
    }

    /// Installs the build-time handler set, returning the previous set.
    pub fn set_build_time_handlers(&self, handlers: Vec<SharedHandler>) -> Vec<SharedHandler> {
        self.install(Phase::BuildTimeConfigured, handlers)
    }

    /// Enables or disables flushing after every forwarded record.
    pub fn set_auto_flush(&self, enabled: bool) {
        self.auto_flush.store(enabled, Ordering::Release);
    }

    /// Reports whether every forwarded record is followed by a flush.
    pub fn auto_flush(&self) -> bool {
        self.auto_flush.load(Ordering::Acquire)
    }

    /// Sets the check applied to buffered records when they are replayed.
    pub fn set_replay_gate(&self, gate: Option<ReplayGate>) {
        *self
            .replay_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner) = gate;
    }

    /// Number of records waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.lock_buffer().records.len()
    }

    /// Number of records dropped because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn install(&self, phase: Phase, handlers: Vec<SharedHandler>) -> Vec<SharedHandler> {
        // Buffered records must reach the new handlers before any producer
        // can observe the new snapshot.
        let mut buffer = self.lock_buffer();
        let gate = self
            .replay_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for record in buffer.records.drain(..) {
            if gate.as_ref().is_none_or(|gate| gate(&record)) {
                self.forward(&handlers, &record);
            }
        }
        let previous = self.installed.swap(Arc::new(Installed { phase, handlers }));
        drop(buffer);
        previous.handlers.clone()
    }

    fn forward(&self, handlers: &[SharedHandler], record: &Record) {
        let auto_flush = self.auto_flush();
        for handler in handlers {
            handler.publish(record);
            if auto_flush {
                handler.flush();
            }
        }
    }

    fn enqueue(buffer: &mut Buffer, record: &Record) -> bool {
        if buffer.capacity == 0 {
            return false;
        }
        let mut dropped = false;
        while buffer.records.len() >= buffer.capacity {
            buffer.records.pop_front();
            dropped = true;
        }
        buffer.records.push_back(record.clone());
        !dropped
    }
}

impl Default for DelayedHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for DelayedHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn publish(&self, record: &Record) {
        if !self.core.is_loggable(record) {
            return;
        }
        let snapshot = self.installed.load();
        if snapshot.phase != Phase::Unconfigured {
            self.forward(&snapshot.handlers, record);
            return;
        }
        drop(snapshot);

        let mut buffer = self.lock_buffer();
        let snapshot = self.installed.load();
        if snapshot.phase == Phase::Unconfigured {
            if !Self::enqueue(&mut buffer, record) {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }
        drop(buffer);
        self.forward(&snapshot.handlers, record);
    }

    fn flush(&self) {
        for handler in &self.installed.load().handlers {
            handler.flush();
        }
    }

    fn close(&self) {
        if self.core.mark_closed() {
            self.flush();
            self.lock_buffer().records.clear();
        }
    }

    fn kind(&self) -> &'static str {
        "delayed"
    }
}

impl fmt::Debug for DelayedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let installed = self.installed.load();
        f.debug_struct("DelayedHandler")
            .field("phase", &installed.phase)
            .field("handlers", &installed.handlers.len())
            .field("buffered", &self.buffered())
            .field("dropped", &self.dropped())
            .finish()
    }
}
