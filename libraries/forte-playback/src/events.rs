//! Change notification channels
//!
//! One typed publish/subscribe channel per observable aspect of the engine.
//! Channels are the sole push mechanism toward observers; the engine only
//! exposes getters for reading initial state.

use std::sync::{Arc, Mutex};

use crate::types::{NowPlaying, PlaybackState, QueueItem, RepeatMode};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Listeners<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

/// A broadcast channel for one observable aspect
///
/// Callbacks run inline on the emitting thread, against a snapshot of the
/// listener set, so a callback may subscribe or unsubscribe without
/// deadlocking the channel.
pub struct Channel<T> {
    inner: Arc<Mutex<Listeners<T>>>,
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Channel<T> {
    /// Create a channel with no listeners
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    /// Register a callback for every future emission
    ///
    /// The returned [`Subscription`] unsubscribes when dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.callbacks.push((id, Arc::new(callback)));
            id
        };

        let channel = Arc::clone(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                channel.lock().unwrap().callbacks.retain(|(i, _)| *i != id);
            })),
        }
    }

    /// Deliver a value to every current listener
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = {
            let inner = self.inner.lock().unwrap();
            inner.callbacks.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        for callback in snapshot {
            callback(value);
        }
    }

    #[cfg(test)]
    fn listener_count(&self) -> usize {
        self.inner.lock().unwrap().callbacks.len()
    }
}

/// Handle for an active subscription
///
/// Dropping the handle removes the callback from the channel.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Explicitly remove the callback now
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// The engine's notification channels, one per observable aspect
#[derive(Clone, Default)]
pub(crate) struct PlayerEvents {
    pub queue: Channel<Vec<QueueItem>>,
    pub now_playing: Channel<Option<NowPlaying>>,
    pub repeat: Channel<RepeatMode>,
    pub state: Channel<PlaybackState>,
    pub shuffle: Channel<bool>,
    pub volume: Channel<u8>,
    pub position: Channel<f64>,
    pub errors: Channel<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emits_reach_all_listeners() {
        let channel: Channel<u32> = Channel::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_a = Arc::clone(&seen);
        let _a = channel.subscribe(move |value| {
            seen_a.fetch_add(*value as usize, Ordering::SeqCst);
        });
        let seen_b = Arc::clone(&seen);
        let _b = channel.subscribe(move |value| {
            seen_b.fetch_add(*value as usize, Ordering::SeqCst);
        });

        channel.emit(&5);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn dropping_the_handle_unsubscribes() {
        let channel: Channel<u32> = Channel::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_cb = Arc::clone(&seen);
        let handle = channel.subscribe(move |_| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        });

        channel.emit(&1);
        drop(handle);
        channel.emit(&1);

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn explicit_unsubscribe_removes_listener() {
        let channel: Channel<&'static str> = Channel::new();
        let handle = channel.subscribe(|_| {});
        assert_eq!(channel.listener_count(), 1);

        handle.unsubscribe();
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn subscribing_from_a_callback_does_not_deadlock() {
        let channel: Channel<u32> = Channel::new();
        let inner_channel = channel.clone();
        let stash: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let stash_cb = Arc::clone(&stash);
        let _outer = channel.subscribe(move |_| {
            let sub = inner_channel.subscribe(|_| {});
            stash_cb.lock().unwrap().push(sub);
        });

        channel.emit(&0);
        assert_eq!(channel.listener_count(), 2);
    }
}
