//! Observable state shared between the UI and controllers

mod subscription;

pub use subscription::{Subscription, SubscriptionId, SubscriptionSet};

use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;
type Listeners<T> = Vec<(SubscriptionId, Listener<T>)>;

/// A value that notifies its subscribers whenever it is replaced.
///
/// Listeners run synchronously on the thread that changed the value, after
/// every lock has been released, so they may freely read or write stores.
pub struct Store<T> {
    value: Arc<RwLock<T>>,
    listeners: Arc<RwLock<Listeners<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            listeners: self.listeners.clone(),
        }
    }
}

impl<T: Default + Clone + Send + Sync + 'static> Default for Store<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + Send + Sync + 'static> Store<T> {
    /// Create a new store
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Snapshot of the current value
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Replace the value and notify subscribers
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.notify();
    }

    /// Mutate the value in place and notify subscribers
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut value = self.value.write();
            f(&mut value);
        }
        self.notify();
    }

    /// Register a listener. It is not called with the current value.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.listeners.write().push((id, Arc::new(listener)));

        let listeners = Arc::downgrade(&self.listeners);
        Subscription::new(id, move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.write().retain(|(existing, _)| *existing != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify(&self) {
        let value = self.get();
        let listeners: Vec<Listener<T>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribers_see_new_values() {
        let store = Store::new(1);
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_in = seen.clone();
        let _sub = store.subscribe(move |value: &i32| {
            seen_in.store(*value as usize, Ordering::SeqCst);
        });

        store.set(5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);

        store.update(|value| *value += 1);
        assert_eq!(seen.load(Ordering::SeqCst), 6);
        assert_eq!(store.get(), 6);
    }

    #[test]
    fn test_dropping_handle_unsubscribes() {
        let store = Store::new(String::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_in = calls.clone();
        let sub = store.subscribe(move |_: &String| {
            calls_in.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(store.subscriber_count(), 1);

        store.set("a".into());
        drop(sub);
        store.set("b".into());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_subscription_set_clear() {
        let store = Store::new(0u8);
        let mut set = SubscriptionSet::new();
        set.push(store.subscribe(|_| {}));
        set.push(store.subscribe(|_| {}));
        assert_eq!(store.subscriber_count(), 2);

        set.clear();
        assert!(set.is_empty());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_listener_can_write_other_store() {
        let source = Store::new(0);
        let mirror = Store::new(0);

        let mirror_in = mirror.clone();
        let _sub = source.subscribe(move |value: &i32| mirror_in.set(*value * 2));

        source.set(21);
        assert_eq!(mirror.get(), 42);
    }
}
