//! Shared control values
//!
//! A control value is a named `f64` slot that the control thread, the audio
//! thread and the UI all read and write without taking a lock. Values are
//! stored as raw bits in an `AtomicU64`.
//!
//! All loads and stores use `Ordering::Relaxed`: each value is independent,
//! so a reader may briefly see loop-in from one track and loop-out from the
//! next. Consumers must tolerate that.
//!
//! # Change notification
//!
//! ```ignore
//! let registry = ControlRegistry::new();
//! let bpm = registry.get_or_create(ControlKey::new("[Channel1]", "file_bpm"), 0.0);
//!
//! let changes = bpm.watch();
//! bpm.set(128.0);
//! assert_eq!(changes.recv().unwrap().value, 128.0);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crossbeam::channel::{Receiver, Sender, TrySendError};

/// Address of a control value: `(group, item)`, e.g. `("[Channel1]", "file_bpm")`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlKey {
    pub group: String,
    pub item: String,
}

impl ControlKey {
    pub fn new(group: impl Into<String>, item: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            item: item.into(),
        }
    }
}

impl fmt::Display for ControlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.group, self.item)
    }
}

/// Published to watchers whenever a control value actually changes
#[derive(Debug, Clone, PartialEq)]
pub struct ControlChange {
    pub key: Arc<ControlKey>,
    pub value: f64,
}

/// Changes buffered per watcher before further changes are dropped for it
pub const WATCH_CAPACITY: usize = 256;

/// A named scalar shared between threads
pub struct ControlValue {
    key: Arc<ControlKey>,
    bits: AtomicU64,
    default: f64,
    /// Number of live watchers, checked before touching the watcher list so
    /// that writers with nobody listening never lock
    watcher_count: AtomicUsize,
    watchers: Mutex<Vec<Sender<ControlChange>>>,
}

impl ControlValue {
    /// Create a control holding its default value
    pub fn new(key: ControlKey, default: f64) -> Self {
        Self {
            key: Arc::new(key),
            bits: AtomicU64::new(default.to_bits()),
            default,
            watcher_count: AtomicUsize::new(0),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn key(&self) -> &ControlKey {
        &self.key
    }

    /// Read the current value (lock-free)
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Write a value, notifying watchers if it changed
    pub fn set(&self, value: f64) {
        if self.store(value) {
            let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
            self.notify(&mut watchers, value);
        }
    }

    /// Write a value from the audio thread
    ///
    /// Never blocks: if the watcher list is busy the change is still stored
    /// but watchers aren't told about it.
    pub fn set_realtime(&self, value: f64) {
        if self.store(value) {
            if let Ok(mut watchers) = self.watchers.try_lock() {
                self.notify(&mut watchers, value);
            }
        }
    }

    /// Store the bits, returning whether watchers need a notification
    #[inline]
    fn store(&self, value: f64) -> bool {
        let new_bits = value.to_bits();
        let old_bits = self.bits.swap(new_bits, Ordering::Relaxed);
        old_bits != new_bits && self.watcher_count.load(Ordering::Relaxed) > 0
    }

    /// Restore the value the control was created with
    pub fn reset(&self) {
        self.set(self.default);
    }

    /// The value this control was created with
    pub fn default_value(&self) -> f64 {
        self.default
    }

    /// Subscribe to changes of this control
    ///
    /// Dropping the receiver unsubscribes on the next change. A watcher more
    /// than [`WATCH_CAPACITY`] changes behind misses the newer ones.
    pub fn watch(&self) -> Receiver<ControlChange> {
        let (tx, rx) = crossbeam::channel::bounded(WATCH_CAPACITY);
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.push(tx);
        self.watcher_count.store(watchers.len(), Ordering::Relaxed);
        rx
    }

    fn notify(&self, watchers: &mut Vec<Sender<ControlChange>>, value: f64) {
        let change = ControlChange {
            key: Arc::clone(&self.key),
            value,
        };
        // A full channel only means that watcher lags; keep it subscribed
        watchers.retain(|tx| {
            !matches!(
                tx.try_send(change.clone()),
                Err(TrySendError::Disconnected(_))
            )
        });
        self.watcher_count.store(watchers.len(), Ordering::Relaxed);
    }
}

impl fmt::Debug for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlValue")
            .field("key", &self.key)
            .field("value", &self.get())
            .finish_non_exhaustive()
    }
}

/// Process-wide directory of control values
///
/// Controls are created once and never removed, so an `Arc<ControlValue>`
/// handed out here stays valid for the lifetime of the session.
#[derive(Default)]
pub struct ControlRegistry {
    controls: RwLock<HashMap<ControlKey, Arc<ControlValue>>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing control
    pub fn get(&self, key: &ControlKey) -> Option<Arc<ControlValue>> {
        self.controls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Look up a control, creating it with `default` if it doesn't exist yet
    pub fn get_or_create(&self, key: ControlKey, default: f64) -> Arc<ControlValue> {
        if let Some(control) = self.get(&key) {
            return control;
        }

        let mut controls = self.controls.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(controls.entry(key.clone()).or_insert_with(|| {
            log::debug!("Creating control {}", key);
            Arc::new(ControlValue::new(key, default))
        }))
    }

    /// Number of registered controls
    pub fn len(&self) -> usize {
        self.controls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_default_and_reset() {
        let control = ControlValue::new(ControlKey::new("[Channel1]", "loop_start_position"), -1.0);
        assert_eq!(control.get(), -1.0);

        control.set(88200.0);
        assert_eq!(control.get(), 88200.0);

        control.reset();
        assert_eq!(control.get(), -1.0);
    }

    #[test]
    fn test_watch_only_sees_real_changes() {
        let control = ControlValue::new(ControlKey::new("[Channel1]", "file_bpm"), 0.0);
        let changes = control.watch();

        control.set(128.0);
        control.set(128.0);
        control.set(126.5);

        let values: Vec<f64> = changes.try_iter().map(|c| c.value).collect();
        assert_eq!(values, vec![128.0, 126.5]);
    }

    #[test]
    fn test_realtime_set_notifies_without_blocking() {
        let control = ControlValue::new(ControlKey::new("[Channel1]", "beat_active"), 0.0);
        let changes = control.watch();

        control.set_realtime(1.0);
        assert_eq!(changes.try_recv().map(|c| c.value), Ok(1.0));

        // Watcher list busy: value still lands, notification is skipped
        let guard = control.watchers.lock().unwrap();
        control.set_realtime(0.0);
        drop(guard);
        assert_eq!(control.get(), 0.0);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn test_lagging_watcher_stays_subscribed() {
        let control = ControlValue::new(ControlKey::new("[Channel1]", "playposition"), 0.0);
        let changes = control.watch();

        for i in 1..=(WATCH_CAPACITY + 10) {
            control.set(i as f64);
        }
        assert_eq!(changes.len(), WATCH_CAPACITY);
        assert_eq!(control.watcher_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_dropped_watcher_is_pruned() {
        let control = ControlValue::new(ControlKey::new("[Channel1]", "replaygain"), 0.0);
        drop(control.watch());

        control.set(1.5);
        assert_eq!(control.watcher_count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_registry_returns_same_control() {
        let registry = ControlRegistry::new();
        let key = ControlKey::new("[Channel2]", "duration");

        let a = registry.get_or_create(key.clone(), 0.0);
        let b = registry.get_or_create(key.clone(), 42.0);
        a.set(180000.0);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.get(), 180000.0);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&ControlKey::new("[Channel3]", "duration")).is_none());
    }

    #[test]
    fn test_key_display() {
        let key = ControlKey::new("[Channel1]", "cue_point");
        assert_eq!(key.to_string(), "[Channel1],cue_point");
    }
}
