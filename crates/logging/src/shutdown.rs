//! crates/logging/src/shutdown.rs
//! Ordered release actions for one generation of handlers.
//!
//! Every handler the assembly creates registers a close action here. Running
//! the list releases a generation in reverse order of registration (LIFO),
//! so a wrapper is closed before the handlers registered ahead of it.

use std::fmt;
use std::sync::{Mutex, PoisonError};

/// A deferred release action.
pub type ShutdownAction = Box<dyn FnOnce() + Send>;

/// LIFO list of release actions that runs at most once.
#[derive(Default)]
pub struct ShutdownList {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    actions: Vec<ShutdownAction>,
    ran: bool,
}

impl ShutdownList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an action. Actions registered after [`run`](Self::run)
    /// execute immediately.
    pub fn register(&self, action: ShutdownAction) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.ran {
            drop(state);
            action();
        } else {
            state.actions.push(action);
        }
    }

    /// Runs every registered action in reverse order. Later calls do
    /// nothing and return `false`.
    pub fn run(&self) -> bool {
        let actions = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.ran {
                return false;
            }
            state.ran = true;
            std::mem::take(&mut state.actions)
        };
        for action in actions.into_iter().rev() {
            action();
        }
        true
    }

    /// Returns the number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .actions
            .len()
    }

    /// Reports whether no actions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports whether [`run`](Self::run) has been called.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).ran
    }
}

impl fmt::Debug for ShutdownList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownList")
            .field("pending", &self.len())
            .field("ran", &self.has_run())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn runs_in_reverse_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let list = ShutdownList::new();
        for index in 0..3 {
            let order = Arc::clone(&order);
            list.register(Box::new(move || order.lock().unwrap().push(index)));
        }
        assert_eq!(list.len(), 3);

        assert!(list.run());

        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(list.is_empty());
    }

    #[test]
    fn runs_at_most_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let list = ShutdownList::new();
        let counter = Arc::clone(&count);
        list.register(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(list.run());
        assert!(!list.run());
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(list.has_run());
    }

    #[test]
    fn late_registration_runs_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let list = ShutdownList::new();
        list.run();

        let counter = Arc::clone(&count);
        list.register(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(list.is_empty());
    }
}
