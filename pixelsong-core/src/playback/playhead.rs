//! Playhead reporting
//!
//! The playhead is a best-effort "which column is sounding" value for the UI.
//! Updates are produced by the scheduler ahead of time and fired later by the
//! host, so each one carries the cancellation token of the session that made
//! it. A stopped session's updates are dropped on arrival.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared "this session is still alive" flag
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct PlayheadInner {
    column: Mutex<Option<usize>>,
    subscribers: Mutex<Vec<Sender<Option<usize>>>>,
}

/// Thread-safe current-column value with change notifications
#[derive(Clone, Debug, Default)]
pub struct Playhead {
    inner: Arc<PlayheadInner>,
}

impl Playhead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column currently sounding, `None` when stopped
    pub fn current(&self) -> Option<usize> {
        self.inner.column.lock().map(|c| *c).unwrap_or(None)
    }

    /// Receive every change of the playhead from now on
    pub fn subscribe(&self) -> Receiver<Option<usize>> {
        let (tx, rx) = unbounded();
        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn clear(&self) {
        self.publish(None);
    }

    fn publish(&self, column: Option<usize>) {
        let changed = match self.inner.column.lock() {
            Ok(mut current) => {
                let changed = *current != column;
                *current = column;
                changed
            }
            Err(_) => false,
        };
        if changed {
            if let Ok(mut subscribers) = self.inner.subscribers.lock() {
                // Drop subscribers whose receiver is gone
                subscribers.retain(|tx| tx.send(column).is_ok());
            }
        }
    }
}

/// A deferred playhead move produced by one scheduling pass
#[derive(Clone, Debug)]
pub struct PlayheadUpdate {
    pub column: usize,
    /// How long after the scheduling pass the column starts sounding
    pub delay: Duration,
    token: CancellationToken,
}

impl PlayheadUpdate {
    pub(crate) fn new(column: usize, delay: Duration, token: CancellationToken) -> Self {
        Self {
            column,
            delay,
            token,
        }
    }

    /// True if the session that produced this update has been stopped
    pub fn is_stale(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Apply the update unless its session is gone. Returns whether it applied.
    pub fn fire(&self, playhead: &Playhead) -> bool {
        if self.is_stale() {
            return false;
        }
        playhead.publish(Some(self.column));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_updates_playhead() {
        let playhead = Playhead::new();
        let update = PlayheadUpdate::new(3, Duration::ZERO, CancellationToken::new());
        assert!(update.fire(&playhead));
        assert_eq!(playhead.current(), Some(3));
    }

    #[test]
    fn test_stale_update_is_dropped() {
        let playhead = Playhead::new();
        let token = CancellationToken::new();
        let update = PlayheadUpdate::new(5, Duration::from_millis(10), token.clone());
        token.cancel();
        assert!(update.is_stale());
        assert!(!update.fire(&playhead));
        assert_eq!(playhead.current(), None);
    }

    #[test]
    fn test_subscribers_see_changes_only() {
        let playhead = Playhead::new();
        let rx = playhead.subscribe();
        let token = CancellationToken::new();

        PlayheadUpdate::new(0, Duration::ZERO, token.clone()).fire(&playhead);
        PlayheadUpdate::new(0, Duration::ZERO, token.clone()).fire(&playhead);
        PlayheadUpdate::new(1, Duration::ZERO, token).fire(&playhead);
        playhead.clear();

        let seen: Vec<Option<usize>> = rx.try_iter().collect();
        assert_eq!(seen, vec![Some(0), Some(1), None]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let playhead = Playhead::new();
        drop(playhead.subscribe());
        let token = CancellationToken::new();
        PlayheadUpdate::new(2, Duration::ZERO, token).fire(&playhead);
        assert_eq!(playhead.inner.subscribers.lock().unwrap().len(), 0);
    }
}
