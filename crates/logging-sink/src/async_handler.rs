//! crates/logging-sink/src/async_handler.rs
//! Decorator handing records to a consumer thread through a bounded queue.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crate::error::{SinkError, SinkResult};
use crate::handler::{Handler, HandlerCore, SharedHandler};
use crate::record::Record;

/// Default queue length.
pub const DEFAULT_QUEUE_LENGTH: usize = 512;

/// What a producer does when the queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum OverflowAction {
    /// Wait until the consumer makes room.
    #[default]
    Block,
    /// Drop the record being published.
    #[cfg_attr(feature = "serde", serde(alias = "discard-newest"))]
    Discard,
    /// Drop the oldest queued record to make room.
    DiscardOldest,
}

impl FromStr for OverflowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "block" => Ok(Self::Block),
            "discard" | "discard-newest" => Ok(Self::Discard),
            "discard-oldest" => Ok(Self::DiscardOldest),
            other => Err(format!("unknown overflow action '{other}'")),
        }
    }
}

#[derive(Debug)]
struct Queue {
    records: VecDeque<Record>,
    suspended: bool,
    in_flight: bool,
    closing: bool,
}

struct Shared {
    capacity: usize,
    overflow: OverflowAction,
    queue: Mutex<Queue>,
    // Signalled when records arrive, on resume and on close.
    work: Condvar,
    // Signalled when the consumer takes or finishes a record.
    idle: Condvar,
    handlers: RwLock<Vec<SharedHandler>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handlers(&self) -> Vec<SharedHandler> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn run(&self) {
        loop {
            let record = {
                let mut queue = self.lock();
                while (queue.records.is_empty() || queue.suspended) && !queue.closing {
                    queue = self.work.wait(queue).unwrap_or_else(PoisonError::into_inner);
                }
                let Some(record) = queue.records.pop_front() else {
                    break;
                };
                queue.in_flight = true;
                self.idle.notify_all();
                record
            };
            for handler in self.handlers() {
                handler.publish(&record);
            }
            self.lock().in_flight = false;
            self.idle.notify_all();
        }
    }
}

/// Publishes records to wrapped handlers from a dedicated thread.
pub struct AsyncHandler {
    core: HandlerCore,
    shared: Arc<Shared>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncHandler {
    /// Creates the queue and starts the consumer thread.
    pub fn new(queue_length: usize, overflow: OverflowAction) -> SinkResult<Self> {
        let shared = Arc::new(Shared {
            capacity: queue_length.max(1),
            overflow,
            queue: Mutex::new(Queue {
                records: VecDeque::new(),
                suspended: false,
                in_flight: false,
                closing: false,
            }),
            work: Condvar::new(),
            idle: Condvar::new(),
            handlers: RwLock::new(Vec::new()),
        });
        let consumer = Arc::clone(&shared);
        let join = thread::Builder::new()
            .name("logging-async".to_owned())
            .spawn(move || consumer.run())
            .map_err(SinkError::Spawn)?;
        Ok(Self {
            core: HandlerCore::default(),
            shared,
            consumer: Mutex::new(Some(join)),
        })
    }

    /// Adds a wrapped handler.
    pub fn add_handler(&self, handler: SharedHandler) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Returns the wrapped handlers.
    pub fn handlers(&self) -> Vec<SharedHandler> {
        self.shared.handlers()
    }

    /// Returns the queue length.
    pub fn queue_length(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the overflow policy.
    pub fn overflow(&self) -> OverflowAction {
        self.shared.overflow
    }

    /// Stops the consumer from taking records until [`resume`](Self::resume).
    pub fn suspend(&self) {
        self.shared.lock().suspended = true;
    }

    /// Lets the consumer continue.
    pub fn resume(&self) {
        self.shared.lock().suspended = false;
        self.shared.work.notify_all();
    }

    /// Number of records waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared.lock().records.len()
    }
}

impl Handler for AsyncHandler {
    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn publish(&self, record: &Record) {
        if !self.core.is_loggable(record) {
            return;
        }
        let shared = &self.shared;
        let mut queue = shared.lock();
        if queue.records.len() >= shared.capacity {
            match shared.overflow {
                OverflowAction::Block => {
                    while queue.records.len() >= shared.capacity && !queue.closing {
                        queue = shared.idle.wait(queue).unwrap_or_else(PoisonError::into_inner);
                    }
                }
                OverflowAction::Discard => return,
                OverflowAction::DiscardOldest => {
                    queue.records.pop_front();
                }
            }
        }
        if queue.closing {
            return;
        }
        queue.records.push_back(record.clone());
        shared.work.notify_one();
    }

    /// Waits for the queue to drain, then flushes the wrapped handlers.
    ///
    /// A suspended handler does not wait.
    fn flush(&self) {
        {
            let shared = &self.shared;
            let mut queue = shared.lock();
            while (!queue.records.is_empty() || queue.in_flight)
                && !queue.suspended
                && !queue.closing
            {
                queue = shared.idle.wait(queue).unwrap_or_else(PoisonError::into_inner);
            }
        }
        for handler in self.shared.handlers() {
            handler.flush();
        }
    }

    fn close(&self) {
        if !self.core.mark_closed() {
            return;
        }
        {
            let mut queue = self.shared.lock();
            queue.closing = true;
            queue.suspended = false;
        }
        self.shared.work.notify_all();
        self.shared.idle.notify_all();
        let join = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(join) = join
            && join.join().is_err()
        {
            self.core.report(
                "Asynchronous log consumer panicked",
                None,
                crate::ErrorCode::Close,
            );
        }
        for handler in self.shared.handlers() {
            handler.close();
        }
    }

    fn kind(&self) -> &'static str {
        "async"
    }
}

impl fmt::Debug for AsyncHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandler")
            .field("queue_length", &self.shared.capacity)
            .field("overflow", &self.shared.overflow)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}
