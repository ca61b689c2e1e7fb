//! Device-side support the generated code builds on.
//!
//! A generated `RawConfig` lives in exactly one [`ConfigCell`], shared through an
//! `Arc` owned by whoever runs the device. All reads and writes go through the
//! cell's single lock; the typestate accessors only decide *which* part of the
//! record a callback may see.
//!
//! Change notifications carry nothing but the fact that a leaf changed. They are
//! sent after the lock is released, coalesce while unread, and are never required
//! for correctness: a subscriber that misses one still reads the current value
//! under the lock.

use crate::codec::{self, Wire};
use crate::frame::{self, DeserializeError};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

/// String field with a compile-time byte capacity.
pub type BoundedString<const N: usize> = heapless::String<N>;

pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 16;

/// Rejection of an update message; the record is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    #[error("value below minimum {min}")]
    TooSmall { min: i128 },
    #[error("value above maximum {max}")]
    TooLarge { max: i128 },
}

/// Copy `s` into a bounded string, or report the capacity as `TooLarge`.
pub fn bounded<const N: usize>(s: &str) -> Result<BoundedString<N>, UpdateError> {
    let mut out = BoundedString::<N>::new();
    out.push_str(s)
        .map_err(|_| UpdateError::TooLarge { max: N as i128 })?;
    Ok(out)
}

/// Copy as much of `s` as fits, cutting at a character boundary.
pub fn bounded_lossy<const N: usize>(s: &str) -> BoundedString<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    bounded(&s[..end]).unwrap_or_default()
}

/// Compile-time identity of a leaf key in the generated `keys` module.
pub trait LeafKey {
    /// Flattened index, also the update-message key.
    const INDEX: usize;
    /// Dotted path, for diagnostics.
    const PATH: &'static str;
}

/// A record with a schema version and a versioned blob form.
pub trait Versioned: Wire + Default {
    const VERSION: u32;
    /// Upper bound on [`Versioned::serialize`] output.
    const MAX_SERIALIZED_LEN: usize;

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::MAX_SERIALIZED_LEN);
        frame::write_version(&mut out, Self::VERSION);
        self.encode(&mut out);
        out
    }

    /// Check the version prefix, then decode the whole payload.
    fn deserialize(bytes: &[u8]) -> Result<Self, DeserializeError> {
        let payload = frame::check_version(bytes, Self::VERSION)?;
        Ok(codec::decode_exact(payload)?)
    }

    /// Boot path: the persisted blob if it decodes, otherwise defaults.
    fn load_or_default(bytes: Option<&[u8]>) -> Self {
        match bytes.map(Self::deserialize) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                log::warn!("stored configuration unreadable ({}); using defaults", e);
                Self::default()
            }
            None => {
                log::debug!("no stored configuration; using defaults");
                Self::default()
            }
        }
    }
}

struct Subscriber {
    index: usize,
    tx: SyncSender<()>,
    alive: Weak<()>,
}

/// The one lock around a configuration record.
pub struct ConfigCell<C> {
    value: Mutex<C>,
    subscribers: Mutex<Vec<Subscriber>>,
    capacity: usize,
}

impl<C> ConfigCell<C> {
    pub fn new(value: C) -> Self {
        Self::with_subscriber_capacity(value, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_subscriber_capacity(value: C, capacity: usize) -> Self {
        ConfigCell {
            value: Mutex::new(value),
            subscribers: Mutex::new(Vec::new()),
            capacity,
        }
    }

    pub fn shared(value: C) -> Arc<Self> {
        Arc::new(Self::new(value))
    }

    // A callback that panicked leaves a record that is still well-formed, so
    // poisoning is ignored.
    fn lock_value(&self) -> MutexGuard<'_, C> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with shared access under the lock. Must not re-enter the cell.
    pub fn with<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        let guard = self.lock_value();
        f(&guard)
    }

    /// Run a mutation that reports the index it changed; subscribers of that
    /// index are notified once the lock is released.
    pub fn modify<E>(&self, f: impl FnOnce(&mut C) -> Result<usize, E>) -> Result<usize, E> {
        let index = {
            let mut guard = self.lock_value();
            f(&mut guard)?
        };
        log::debug!("leaf {} updated", index);
        self.notify(index);
        Ok(index)
    }

    /// Swap in a whole new record and notify every subscriber.
    pub fn replace(&self, value: C) -> C {
        let old = std::mem::replace(&mut *self.lock_value(), value);
        let mut indices: Vec<usize> = self.lock_subscribers().iter().map(|s| s.index).collect();
        indices.sort_unstable();
        indices.dedup();
        for index in indices {
            self.notify(index);
        }
        old
    }

    pub fn snapshot(&self) -> C
    where
        C: Clone,
    {
        self.with(C::clone)
    }

    /// Register interest in leaf `index`. `None` when every slot is taken by a
    /// live subscription.
    pub fn subscribe(&self, index: usize) -> Option<Subscription> {
        let mut subs = self.lock_subscribers();
        subs.retain(|s| s.alive.strong_count() > 0);
        if subs.len() >= self.capacity {
            log::debug!("subscriber capacity {} reached; leaf {} refused", self.capacity, index);
            return None;
        }
        let (tx, rx) = mpsc::sync_channel(1);
        let alive = Arc::new(());
        subs.push(Subscriber {
            index,
            tx,
            alive: Arc::downgrade(&alive),
        });
        Some(Subscription {
            index,
            rx,
            _alive: alive,
        })
    }

    fn notify(&self, index: usize) {
        let subs = self.lock_subscribers();
        for sub in subs.iter().filter(|s| s.index == index) {
            match sub.tx.try_send(()) {
                Ok(()) => log::trace!("notified subscriber of leaf {}", index),
                Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
            }
        }
    }

    /// Live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers()
            .iter()
            .filter(|s| s.alive.strong_count() > 0)
            .count()
    }
}

impl<C: Default> Default for ConfigCell<C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

/// Receiving end of [`ConfigCell::subscribe`]. Dropping it frees the slot.
pub struct Subscription {
    index: usize,
    rx: Receiver<()>,
    _alive: Arc<()>,
}

impl Subscription {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Consume a pending notification, if any.
    pub fn has_changed(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    /// Block until the leaf changes. `false` once the cell is gone.
    pub fn wait(&self) -> bool {
        self.rx.recv().is_ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn set(cell: &ConfigCell<[u32; 2]>, index: usize, v: u32) -> Result<usize, UpdateError> {
        cell.modify(|c| {
            if v > 100 {
                return Err(UpdateError::TooLarge { max: 100 });
            }
            c[index] = v;
            Ok(index)
        })
    }

    #[test]
    fn bounded_strings() {
        assert_eq!(bounded::<3>("abc").unwrap().as_str(), "abc");
        assert_eq!(bounded::<3>("abcd"), Err(UpdateError::TooLarge { max: 3 }));
        assert_eq!(bounded_lossy::<3>("abcd").as_str(), "abc");
        // 'é' is two bytes and would straddle the cut.
        assert_eq!(bounded_lossy::<2>("aé").as_str(), "a");
    }

    #[test]
    fn notifications_follow_the_changed_index() {
        let cell = ConfigCell::new([0u32; 2]);
        let first = cell.subscribe(0).unwrap();
        let second = cell.subscribe(1).unwrap();
        set(&cell, 0, 5).unwrap();
        assert!(first.has_changed());
        assert!(!second.has_changed());
        assert_eq!(cell.snapshot(), [5, 0]);
    }

    #[test]
    fn notifications_coalesce() {
        let cell = ConfigCell::new([0u32; 2]);
        let sub = cell.subscribe(1).unwrap();
        for v in 0..5 {
            set(&cell, 1, v).unwrap();
        }
        assert!(sub.has_changed());
        assert!(!sub.has_changed());
    }

    #[test]
    fn rejected_update_neither_writes_nor_notifies() {
        let cell = ConfigCell::new([7u32; 2]);
        let sub = cell.subscribe(0).unwrap();
        assert_eq!(set(&cell, 0, 101), Err(UpdateError::TooLarge { max: 100 }));
        assert!(!sub.has_changed());
        assert_eq!(cell.with(|c| c[0]), 7);
    }

    #[test]
    fn capacity_is_enforced_and_freed_on_drop() {
        let cell = ConfigCell::with_subscriber_capacity([0u32; 2], 2);
        let a = cell.subscribe(0).unwrap();
        let _b = cell.subscribe(1).unwrap();
        assert!(cell.subscribe(0).is_none());
        drop(a);
        assert_eq!(cell.subscriber_count(), 1);
        assert!(cell.subscribe(0).is_some());
    }

    #[test]
    fn waiting_thread_wakes_after_update() {
        let cell = Arc::new(ConfigCell::new([0u32; 2]));
        let sub = cell.subscribe(0).unwrap();
        let writer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || set(&cell, 0, 42))
        };
        assert!(sub.wait_timeout(Duration::from_secs(5)));
        writer.join().unwrap().unwrap();
        assert_eq!(cell.with(|c| c[0]), 42);
    }

    #[test]
    fn replace_notifies_everyone() {
        let cell = ConfigCell::new([1u32; 2]);
        let a = cell.subscribe(0).unwrap();
        let b = cell.subscribe(1).unwrap();
        assert_eq!(cell.replace([2, 2]), [1, 1]);
        assert!(a.has_changed() && b.has_changed());
    }
}
