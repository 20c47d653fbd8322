//! Push-based current-value state container.
//!
//! Replaces the reactive observable fields the UI layer binds to. Each
//! subsystem owns its signals and hands out read subscriptions; there are
//! no global mutable singletons. Built on `tokio::sync::watch` so async
//! tasks can await changes without polling.

use std::sync::Arc;
use tokio::sync::watch;

/// A current-value signal: `get`, `set`, and a subscribe/notify mechanism.
///
/// Cloning shares the same underlying value. `set` never fails, even with
/// zero subscribers.
#[derive(Debug)]
pub struct Signal<T> {
    tx: Arc<watch::Sender<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Replace the current value and notify subscribers.
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Update the current value in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    /// Subscribe to value changes. The receiver observes the value at
    /// subscription time plus every subsequent `set`.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T: Clone + Send + Sync + Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let s = Signal::new(1u32);
        assert_eq!(s.get(), 1);
        s.set(5);
        assert_eq!(s.get(), 5);
    }

    #[test]
    fn test_set_without_subscribers_is_ok() {
        let s = Signal::new("a".to_string());
        s.set("b".to_string());
        assert_eq!(s.get(), "b");
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let s = Signal::new(0i64);
        let mut rx = s.subscribe();
        s.set(42);
        rx.changed().await.ok();
        assert_eq!(*rx.borrow(), 42);
    }

    #[test]
    fn test_update_in_place() {
        let s = Signal::new(vec![1, 2]);
        s.update(|v| v.push(3));
        assert_eq!(s.get(), vec![1, 2, 3]);
    }
}
