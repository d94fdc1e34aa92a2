use std::time::Duration;

use bitflags::bitflags;
use serde::Deserialize;

use super::announcement::ItemType;

bitflags! {
    /// Channels the scheduler is allowed to present.
    /// Banner exists in the data model but is off unless explicitly enabled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChannelSet: u8 {
        const BANNER        = 1 << 0;
        const MODAL         = 1 << 1;
        const POPUP         = 1 << 2;
        const NOTIFICATION  = 1 << 3;
    }
}

impl ChannelSet {
    /// The channels presented by default: modal, popup and notification.
    pub const DEFAULT_ENABLED: ChannelSet = ChannelSet::MODAL
        .union(ChannelSet::POPUP)
        .union(ChannelSet::NOTIFICATION);

    pub fn of(item_type: ItemType) -> Self {
        match item_type {
            ItemType::Banner => ChannelSet::BANNER,
            ItemType::Modal => ChannelSet::MODAL,
            ItemType::Popup => ChannelSet::POPUP,
            ItemType::Notification => ChannelSet::NOTIFICATION,
        }
    }

    pub fn enables(self, item_type: ItemType) -> bool {
        self.contains(Self::of(item_type))
    }

    /// Build a set from channel names; unknown names are returned as errors.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let mut set = ChannelSet::empty();
        for name in names {
            let item_type = ItemType::parse(name.as_ref())
                .ok_or_else(|| format!("unknown channel '{}'", name.as_ref()))?;
            set |= Self::of(item_type);
        }
        Ok(set)
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::DEFAULT_ENABLED
    }
}

/// Delay constants driving reveal, advance and presenter animation.
/// All values are milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timing {
    pub banner_initial_ms: u64,
    pub modal_initial_ms: u64,
    pub popup_initial_ms: u64,
    pub notification_initial_ms: u64,
    pub banner_sequential_ms: u64,
    pub modal_sequential_ms: u64,
    pub popup_sequential_ms: u64,
    pub notification_sequential_ms: u64,
    /// Gap between mounting a presenter and starting its enter animation.
    pub enter_delay_ms: u64,
    /// Length of the enter and exit transitions.
    pub transition_ms: u64,
    /// Notifications close on their own after this long.
    pub notification_auto_close_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            banner_initial_ms: 0,
            modal_initial_ms: 2000,
            popup_initial_ms: 5000,
            notification_initial_ms: 1000,
            banner_sequential_ms: 3000,
            modal_sequential_ms: 3000,
            popup_sequential_ms: 3000,
            notification_sequential_ms: 2000,
            enter_delay_ms: 10,
            transition_ms: 300,
            notification_auto_close_ms: 8000,
        }
    }
}

impl Timing {
    pub fn initial_delay(&self, channel: ItemType) -> Duration {
        Duration::from_millis(match channel {
            ItemType::Banner => self.banner_initial_ms,
            ItemType::Modal => self.modal_initial_ms,
            ItemType::Popup => self.popup_initial_ms,
            ItemType::Notification => self.notification_initial_ms,
        })
    }

    pub fn sequential_delay(&self, channel: ItemType) -> Duration {
        Duration::from_millis(match channel {
            ItemType::Banner => self.banner_sequential_ms,
            ItemType::Modal => self.modal_sequential_ms,
            ItemType::Popup => self.popup_sequential_ms,
            ItemType::Notification => self.notification_sequential_ms,
        })
    }

    pub fn enter_delay(&self) -> Duration {
        Duration::from_millis(self.enter_delay_ms)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn notification_auto_close(&self) -> Duration {
        Duration::from_millis(self.notification_auto_close_ms)
    }
}

/// Scheduling phase of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    /// Nothing queued, or not loaded yet.
    Idle,
    /// Reveal timer armed.
    Pending,
    Visible,
    /// Presenter is animating out; the close callback has not fired yet.
    Closing,
    /// Next-item timer armed.
    Advancing,
    /// Last item dismissed. Terminal for the session.
    Exhausted,
}

/// In-memory scheduling state for a single channel.
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub channel: ItemType,
    pub current_index: usize,
    pub visible: bool,
    pub phase: ChannelPhase,
}

impl ChannelState {
    pub fn new(channel: ItemType) -> Self {
        Self {
            channel,
            current_index: 0,
            visible: false,
            phase: ChannelPhase::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_excludes_banner() {
        let set = ChannelSet::default();
        assert!(!set.enables(ItemType::Banner));
        assert!(set.enables(ItemType::Modal));
        assert!(set.enables(ItemType::Popup));
        assert!(set.enables(ItemType::Notification));
    }

    #[test]
    fn test_from_names() {
        let set = ChannelSet::from_names(&["banner", "Modal"]).unwrap();
        assert_eq!(set, ChannelSet::BANNER | ChannelSet::MODAL);
        assert!(ChannelSet::from_names(&["ticker"]).is_err());
        assert!(ChannelSet::from_names::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_default_timing_constants() {
        let t = Timing::default();
        assert_eq!(t.initial_delay(ItemType::Modal), Duration::from_millis(2000));
        assert_eq!(t.initial_delay(ItemType::Popup), Duration::from_millis(5000));
        assert_eq!(t.initial_delay(ItemType::Notification), Duration::from_millis(1000));
        assert_eq!(t.sequential_delay(ItemType::Modal), Duration::from_millis(3000));
        assert_eq!(t.sequential_delay(ItemType::Popup), Duration::from_millis(3000));
        assert_eq!(t.sequential_delay(ItemType::Notification), Duration::from_millis(2000));
        assert_eq!(t.transition(), Duration::from_millis(300));
        assert_eq!(t.notification_auto_close(), Duration::from_millis(8000));
    }

    #[test]
    fn test_timing_partial_toml() {
        let t: Timing = toml::from_str("modal_initial_ms = 50").unwrap();
        assert_eq!(t.modal_initial_ms, 50);
        assert_eq!(t.popup_initial_ms, 5000);
    }
}
