use serde::Serialize;

use super::announcement::{Announcement, AnnouncementId, ItemType};
use super::channel::Timing;
use super::timers::{TimerDriver, TimerKey};

/// Animation phase of a mounted presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPhase {
    /// In the tree but not yet visible.
    Mounted,
    AnimatingIn,
    Shown,
    /// Still on screen while the exit transition runs.
    AnimatingOut,
    Removed,
}

/// Visual treatment of a notification, derived from its priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStyle {
    Error,
    Warning,
    Info,
    Success,
}

impl NotificationStyle {
    pub fn for_priority(priority: i64) -> Self {
        if priority >= 80 {
            NotificationStyle::Error
        } else if priority >= 50 {
            NotificationStyle::Warning
        } else if priority >= 30 {
            NotificationStyle::Info
        } else {
            NotificationStyle::Success
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            NotificationStyle::Error => "red",
            NotificationStyle::Warning => "orange",
            NotificationStyle::Info => "blue",
            NotificationStyle::Success => "green",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            NotificationStyle::Error => "error",
            NotificationStyle::Warning => "warning",
            NotificationStyle::Info => "info",
            NotificationStyle::Success => "check_circle",
        }
    }
}

/// Fire-and-forget navigation to an announcement's link in a new context.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Presentation state machine for one mounted announcement.
///
/// The same machine backs all four channel renderers; the channel decides
/// whether an action button exists and whether the presenter closes itself.
#[derive(Debug, Clone)]
pub struct Presenter {
    channel: ItemType,
    announcement: Announcement,
    phase: RenderPhase,
}

impl Presenter {
    /// Mount a presenter and arm its animation timers.
    pub fn mount<T: TimerDriver>(
        channel: ItemType,
        announcement: Announcement,
        timing: &Timing,
        timers: &mut T,
    ) -> Self {
        timers.schedule_once(TimerKey::Enter(channel), timing.enter_delay());
        if channel == ItemType::Notification {
            timers.schedule_once(
                TimerKey::AutoClose(channel),
                timing.notification_auto_close(),
            );
        }
        Self {
            channel,
            announcement,
            phase: RenderPhase::Mounted,
        }
    }

    pub fn channel(&self) -> ItemType {
        self.channel
    }

    pub fn announcement(&self) -> &Announcement {
        &self.announcement
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    pub fn is_closing(&self) -> bool {
        matches!(self.phase, RenderPhase::AnimatingOut | RenderPhase::Removed)
    }

    /// Style for notification presenters; other channels have none.
    pub fn style(&self) -> Option<NotificationStyle> {
        (self.channel == ItemType::Notification)
            .then(|| NotificationStyle::for_priority(self.announcement.effective_priority()))
    }

    /// Whether an action button is rendered. Notifications never carry one.
    pub fn has_action(&self) -> bool {
        self.channel != ItemType::Notification && self.announcement.action().is_some()
    }

    /// Enter timer fired.
    pub fn on_enter<T: TimerDriver>(&mut self, timing: &Timing, timers: &mut T) {
        if self.phase == RenderPhase::Mounted {
            self.phase = RenderPhase::AnimatingIn;
            timers.schedule_once(TimerKey::Settle(self.channel), timing.transition());
        }
    }

    /// Enter transition finished.
    pub fn on_settle(&mut self) {
        if self.phase == RenderPhase::AnimatingIn {
            self.phase = RenderPhase::Shown;
        }
    }

    /// First half of the two-phase close: flip to `AnimatingOut` now and arm
    /// the callback timer. Returns false if a close is already under way.
    pub fn begin_close<T: TimerDriver>(&mut self, timing: &Timing, timers: &mut T) -> bool {
        if self.is_closing() {
            return false;
        }
        self.phase = RenderPhase::AnimatingOut;
        timers.cancel(TimerKey::Enter(self.channel));
        timers.cancel(TimerKey::Settle(self.channel));
        timers.cancel(TimerKey::AutoClose(self.channel));
        timers.schedule_once(TimerKey::CloseDone(self.channel), timing.transition());
        true
    }

    /// Second half of the two-phase close. Returns the id handed to the
    /// scheduler's close callback, once.
    pub fn finish_close(&mut self) -> Option<AnnouncementId> {
        if self.phase != RenderPhase::AnimatingOut {
            return None;
        }
        self.phase = RenderPhase::Removed;
        Some(self.announcement.id)
    }

    /// Action button clicked. Returns true if a link was opened.
    pub fn click_action(&self, opener: &dyn LinkOpener) -> bool {
        if !self.has_action() || self.is_closing() {
            return false;
        }
        match self.announcement.action() {
            Some((_, url)) => {
                opener.open(url);
                true
            }
            None => false,
        }
    }

    /// Drop every timer this presenter owns.
    pub fn unmount<T: TimerDriver>(&mut self, timers: &mut T) {
        for key in TimerKey::presenter_keys(self.channel) {
            timers.cancel(key);
        }
        self.phase = RenderPhase::Removed;
    }
}
