//! Change-notification token for store consumers
//!
//! A [`ChangeNotifier`] holds a list of observers and fires them when the
//! store content changes externally. Delivery is at-least-once and
//! coalesced: a batch of mutations produces a single notification.
//! Unsubscription is dropping the returned [`WatchGuard`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct NotifierState {
    next_id: u64,
    observers: Vec<(u64, Rc<dyn Fn()>)>,
}

/// Observer list shared between a store and its watch guards.
#[derive(Clone)]
pub struct ChangeNotifier {
    inner: Rc<RefCell<NotifierState>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(NotifierState {
                next_id: 0,
                observers: Vec::new(),
            })),
        }
    }

    /// Register an observer. It stays registered until the guard is dropped.
    pub fn subscribe(&self, observer: Rc<dyn Fn()>) -> WatchGuard {
        let mut state = self.inner.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.observers.push((id, observer));
        WatchGuard {
            state: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Fire every registered observer once.
    ///
    /// The observer list is snapshotted first so observers may subscribe or
    /// unsubscribe from within their callback.
    pub fn notify(&self) {
        let observers: Vec<Rc<dyn Fn()>> = self
            .inner
            .borrow()
            .observers
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for observer in observers {
            observer();
        }
    }

    /// Number of live subscriptions.
    pub fn observer_count(&self) -> usize {
        self.inner.borrow().observers.len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.observer_count())
            .finish()
    }
}

/// Subscription handle; dropping it unsubscribes the observer.
pub struct WatchGuard {
    state: Weak<RefCell<NotifierState>>,
    id: u64,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state
                .borrow_mut()
                .observers
                .retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchGuard").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn notify_fires_each_observer_once() {
        let notifier = ChangeNotifier::new();
        let count = Rc::new(Cell::new(0u32));

        let seen = Rc::clone(&count);
        let _guard = notifier.subscribe(Rc::new(move || seen.set(seen.get() + 1)));

        notifier.notify();
        notifier.notify();
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn dropping_guard_unsubscribes() {
        let notifier = ChangeNotifier::new();
        let count = Rc::new(Cell::new(0u32));

        let seen = Rc::clone(&count);
        let guard = notifier.subscribe(Rc::new(move || seen.set(seen.get() + 1)));
        assert_eq!(notifier.observer_count(), 1);

        drop(guard);
        assert_eq!(notifier.observer_count(), 0);
        notifier.notify();
        assert_eq!(count.get(), 0);
    }
}
