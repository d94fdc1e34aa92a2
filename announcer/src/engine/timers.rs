use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::announcement::ItemType;

/// What a timer does when it fires. At most one timer per key is armed at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// First reveal of a channel after load.
    Reveal(ItemType),
    /// Move a channel to its next queued item.
    Advance(ItemType),
    /// Presenter starts its enter animation.
    Enter(ItemType),
    /// Presenter enter animation finished.
    Settle(ItemType),
    /// Notification auto-close.
    AutoClose(ItemType),
    /// Presenter exit animation finished; the close callback runs.
    CloseDone(ItemType),
}

impl TimerKey {
    #[cfg(test)]
    pub fn channel(self) -> ItemType {
        match self {
            TimerKey::Reveal(c)
            | TimerKey::Advance(c)
            | TimerKey::Enter(c)
            | TimerKey::Settle(c)
            | TimerKey::AutoClose(c)
            | TimerKey::CloseDone(c) => c,
        }
    }

    /// Timers owned by the presenter of `channel` (cleared when it unmounts).
    pub fn presenter_keys(channel: ItemType) -> [TimerKey; 4] {
        [
            TimerKey::Enter(channel),
            TimerKey::Settle(channel),
            TimerKey::AutoClose(channel),
            TimerKey::CloseDone(channel),
        ]
    }
}

/// One-shot timer capability the scheduler is driven by.
///
/// Arming a key that is already armed replaces the earlier timer.
pub trait TimerDriver {
    fn schedule_once(&mut self, key: TimerKey, delay: Duration);
    fn cancel(&mut self, key: TimerKey);
    fn cancel_all(&mut self);
}

/// A timer firing as delivered by [`TokioTimers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub key: TimerKey,
    generation: u64,
}

/// Tokio-backed timers. Each armed timer is a task sleeping for its delay and
/// then posting a [`Fired`] on the driver's channel. Cancelled timers never
/// post, and a firing that raced with a cancel or re-arm is rejected by
/// [`TokioTimers::accept`].
pub struct TokioTimers {
    fired: mpsc::UnboundedSender<Fired>,
    root: CancellationToken,
    armed: HashMap<TimerKey, (u64, CancellationToken)>,
    next_generation: u64,
}

impl TokioTimers {
    /// Create a driver and the receiver its firings arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Fired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = Self {
            fired: tx,
            root: CancellationToken::new(),
            armed: HashMap::new(),
            next_generation: 0,
        };
        (timers, rx)
    }

    /// Claim a firing. Returns false if the timer was cancelled or re-armed
    /// after this firing was posted.
    pub fn accept(&mut self, fired: Fired) -> bool {
        match self.armed.get(&fired.key) {
            Some((generation, _)) if *generation == fired.generation => {
                self.armed.remove(&fired.key);
                true
            }
            _ => {
                debug!(key = ?fired.key, "stale timer firing dropped");
                false
            }
        }
    }

    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.armed.contains_key(&key)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

impl TimerDriver for TokioTimers {
    fn schedule_once(&mut self, key: TimerKey, delay: Duration) {
        let token = self.root.child_token();
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some((_, previous)) = self.armed.insert(key, (generation, token.clone())) {
            previous.cancel();
        }
        let fired = self.fired.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // The receiver is gone once the scheduler has shut down.
                    let _ = fired.send(Fired { key, generation });
                }
            }
        });
        debug!(?key, delay_ms = delay.as_millis() as u64, "timer armed");
    }

    fn cancel(&mut self, key: TimerKey) {
        if let Some((_, token)) = self.armed.remove(&key) {
            token.cancel();
            debug!(?key, "timer cancelled");
        }
    }

    fn cancel_all(&mut self) {
        self.root.cancel();
        self.armed.clear();
        self.root = CancellationToken::new();
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Timer driver that only records what was armed. Tests fire keys by hand.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualTimers {
    pub armed: HashMap<TimerKey, Duration>,
    pub history: Vec<(TimerKey, Duration)>,
}

#[cfg(test)]
impl ManualTimers {
    pub fn is_armed(&self, key: TimerKey) -> bool {
        self.armed.contains_key(&key)
    }

    pub fn scheduled_count(&self, key: TimerKey) -> usize {
        self.history.iter().filter(|(k, _)| *k == key).count()
    }
}

#[cfg(test)]
impl TimerDriver for ManualTimers {
    fn schedule_once(&mut self, key: TimerKey, delay: Duration) {
        self.armed.insert(key, delay);
        self.history.push((key, delay));
    }

    fn cancel(&mut self, key: TimerKey) {
        self.armed.remove(&key);
    }

    fn cancel_all(&mut self) {
        self.armed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (mut timers, mut rx) = TokioTimers::new();
        timers.schedule_once(TimerKey::Reveal(ItemType::Modal), Duration::from_millis(2000));

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.key, TimerKey::Reveal(ItemType::Modal));
        assert!(timers.accept(fired));
        assert!(!timers.is_armed(fired.key));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (mut timers, mut rx) = TokioTimers::new();
        let key = TimerKey::Advance(ItemType::Popup);
        timers.schedule_once(key, Duration::from_millis(100));
        timers.cancel(key);
        assert!(!timers.is_armed(key));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_replaces_previous_timer() {
        let (mut timers, mut rx) = TokioTimers::new();
        let key = TimerKey::AutoClose(ItemType::Notification);
        timers.schedule_once(key, Duration::from_millis(100));
        timers.schedule_once(key, Duration::from_millis(500));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(rx.try_recv().map(|f| f.key), Ok(key));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_silences_everything() {
        let (mut timers, mut rx) = TokioTimers::new();
        for channel in ItemType::ALL {
            timers.schedule_once(TimerKey::Reveal(channel), Duration::from_millis(10));
        }
        assert_eq!(timers.armed_count(), 4);
        timers.cancel_all();
        assert_eq!(timers.armed_count(), 0);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        // The driver is still usable afterwards.
        timers.schedule_once(TimerKey::Reveal(ItemType::Modal), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            rx.try_recv().map(|f| f.key),
            Ok(TimerKey::Reveal(ItemType::Modal))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_firing_that_raced_a_cancel_is_rejected() {
        let (mut timers, mut rx) = TokioTimers::new();
        let key = TimerKey::Enter(ItemType::Modal);
        timers.schedule_once(key, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stale = rx.recv().await.unwrap();

        // Cancelled and re-armed before the firing was processed.
        timers.cancel(key);
        timers.schedule_once(key, Duration::from_millis(10));
        assert!(!timers.accept(stale));
        assert!(timers.is_armed(key));

        let fresh = rx.recv().await.unwrap();
        assert!(timers.accept(fresh));
        assert!(!timers.accept(fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_timers() {
        let (mut timers, mut rx) = TokioTimers::new();
        timers.schedule_once(TimerKey::Settle(ItemType::Modal), Duration::from_millis(10));
        drop(timers);

        tokio::time::sleep(Duration::from_secs(1)).await;
        // Sender side is gone and nothing was delivered.
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_presenter_keys_share_channel() {
        for key in TimerKey::presenter_keys(ItemType::Popup) {
            assert_eq!(key.channel(), ItemType::Popup);
        }
    }
}
