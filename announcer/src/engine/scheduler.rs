use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::store::dismissal::DismissalStore;

use super::announcement::{Announcement, AnnouncementId, ItemType};
use super::channel::{ChannelPhase, ChannelSet, ChannelState, Timing};
use super::presenter::{LinkOpener, NotificationStyle, Presenter, RenderPhase};
use super::queue::compute_queue;
use super::timers::{TimerDriver, TimerKey};

/// Static behaviour of a scheduler: which channels run and how fast.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub enabled: ChannelSet,
    pub timing: Timing,
}

/// One announcement currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedItem {
    pub channel: ItemType,
    pub announcement: Announcement,
    pub phase: RenderPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<NotificationStyle>,
    pub has_action: bool,
}

/// Snapshot of what the scheduler renders at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Frame {
    pub loading: bool,
    pub items: Vec<RenderedItem>,
}

impl Frame {
    pub fn item(&self, channel: ItemType) -> Option<&RenderedItem> {
        self.items.iter().find(|i| i.channel == channel)
    }

    pub fn shows(&self, channel: ItemType) -> Option<AnnouncementId> {
        self.item(channel).map(|i| i.announcement.id)
    }
}

/// Sequential multi-channel announcement scheduler.
///
/// Each channel walks its own queue one announcement at a time, driven by
/// one-shot timers. The scheduler never blocks; every transition happens in
/// response to `on_loaded`, `on_timer`, `request_close` or `click_action`.
pub struct AnnouncementScheduler<T: TimerDriver> {
    config: SchedulerConfig,
    store: DismissalStore,
    timers: T,
    loading: bool,
    disposed: bool,
    dismissed_snapshot: HashSet<AnnouncementId>,
    queues: HashMap<ItemType, Vec<Announcement>>,
    channels: HashMap<ItemType, ChannelState>,
    presenters: HashMap<ItemType, Presenter>,
}

impl<T: TimerDriver> AnnouncementScheduler<T> {
    pub fn new(config: SchedulerConfig, store: DismissalStore, timers: T) -> Self {
        let channels = ItemType::ALL
            .into_iter()
            .map(|c| (c, ChannelState::new(c)))
            .collect();
        Self {
            config,
            store,
            timers,
            loading: true,
            disposed: false,
            dismissed_snapshot: HashSet::new(),
            queues: HashMap::new(),
            channels,
            presenters: HashMap::new(),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn channel_state(&self, channel: ItemType) -> &ChannelState {
        &self.channels[&channel]
    }

    /// Full queue for a channel as computed at load time.
    pub fn queue(&self, channel: ItemType) -> &[Announcement] {
        self.queues.get(&channel).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Queue items not yet dismissed this session, the current one included.
    #[cfg(test)]
    pub fn remaining(&self, channel: ItemType) -> &[Announcement] {
        let queue = self.queue(channel);
        let state = self.channel_state(channel);
        match state.phase {
            ChannelPhase::Exhausted => &[],
            ChannelPhase::Advancing => &queue[(state.current_index + 1).min(queue.len())..],
            _ => &queue[state.current_index.min(queue.len())..],
        }
    }

    /// The item a channel points at, whether or not it is rendered.
    pub fn current(&self, channel: ItemType) -> Option<&Announcement> {
        let state = self.channel_state(channel);
        if !state.visible {
            return None;
        }
        self.queue(channel).get(state.current_index)
    }

    /// A channel is rendered when it is enabled and visible; popup additionally
    /// stays hidden while a modal is visible.
    pub fn is_rendered(&self, channel: ItemType) -> bool {
        if self.loading || self.disposed || !self.config.enabled.enables(channel) {
            return false;
        }
        if !self.channel_state(channel).visible {
            return false;
        }
        if channel == ItemType::Popup && self.channel_state(ItemType::Modal).visible {
            return false;
        }
        true
    }

    pub fn frame(&self) -> Frame {
        let items = ItemType::ALL
            .into_iter()
            .filter_map(|c| self.presenters.get(&c))
            .map(|p| RenderedItem {
                channel: p.channel(),
                announcement: p.announcement().clone(),
                phase: p.phase(),
                style: p.style(),
                has_action: p.has_action(),
            })
            .collect();
        Frame {
            loading: self.loading,
            items,
        }
    }

    // ── Load ────────────────────────────────────────────────────────

    /// Fetch settled. A failed fetch arrives here as an empty list.
    pub fn on_loaded(&mut self, announcements: Vec<Announcement>) {
        if self.disposed {
            return;
        }
        if !self.loading {
            warn!("announcements already loaded for this session, ignoring reload");
            return;
        }
        self.loading = false;
        self.dismissed_snapshot = self.store.dismissed_ids().into_iter().collect();

        for channel in ItemType::ALL {
            let queue = compute_queue(&announcements, channel, &self.dismissed_snapshot);
            if self.config.enabled.enables(channel) && !queue.is_empty() {
                let delay = self.config.timing.initial_delay(channel);
                if let Some(state) = self.channels.get_mut(&channel) {
                    state.phase = ChannelPhase::Pending;
                }
                self.timers.schedule_once(TimerKey::Reveal(channel), delay);
            }
            debug!(%channel, queued = queue.len(), "channel queue computed");
            self.queues.insert(channel, queue);
        }

        info!(
            fetched = announcements.len(),
            dismissed = self.dismissed_snapshot.len(),
            "announcement queues ready"
        );
    }

    // ── Timers ──────────────────────────────────────────────────────

    pub fn on_timer(&mut self, key: TimerKey) {
        if self.disposed {
            return;
        }
        match key {
            TimerKey::Reveal(channel) => {
                if let Some(state) = self.channels.get_mut(&channel)
                    && state.phase == ChannelPhase::Pending
                {
                    state.current_index = 0;
                    state.visible = true;
                    state.phase = ChannelPhase::Visible;
                    info!(%channel, "channel revealed");
                    self.sync_presenters();
                }
            }
            TimerKey::Advance(channel) => {
                let len = self.queue(channel).len();
                if let Some(state) = self.channels.get_mut(&channel)
                    && state.phase == ChannelPhase::Advancing
                    && state.current_index + 1 < len
                {
                    state.current_index += 1;
                    state.visible = true;
                    state.phase = ChannelPhase::Visible;
                    info!(%channel, index = state.current_index, "channel advanced");
                    self.sync_presenters();
                }
            }
            TimerKey::Enter(channel) => {
                if let Some(p) = self.presenters.get_mut(&channel) {
                    p.on_enter(&self.config.timing, &mut self.timers);
                }
            }
            TimerKey::Settle(channel) => {
                if let Some(p) = self.presenters.get_mut(&channel) {
                    p.on_settle();
                }
            }
            TimerKey::AutoClose(channel) => {
                debug!(%channel, "auto-close elapsed");
                self.request_close(channel);
            }
            TimerKey::CloseDone(channel) => {
                let id = self
                    .presenters
                    .get_mut(&channel)
                    .and_then(Presenter::finish_close);
                if let Some(id) = id {
                    self.presenters.remove(&channel);
                    self.on_close(channel, id);
                }
            }
        }
    }

    // ── User interaction ────────────────────────────────────────────

    /// Close the announcement rendered on `channel`. Returns false when nothing
    /// is rendered there or a close is already in progress.
    pub fn request_close(&mut self, channel: ItemType) -> bool {
        if self.disposed {
            return false;
        }
        let Some(presenter) = self.presenters.get_mut(&channel) else {
            return false;
        };
        if !presenter.begin_close(&self.config.timing, &mut self.timers) {
            return false;
        }
        if let Some(state) = self.channels.get_mut(&channel) {
            state.phase = ChannelPhase::Closing;
        }
        debug!(%channel, id = presenter.announcement().id, "close requested");
        true
    }

    /// Action button on `channel` clicked. Returns true if a link was opened.
    pub fn click_action(&self, channel: ItemType, opener: &dyn LinkOpener) -> bool {
        match self.presenters.get(&channel) {
            Some(p) => {
                let opened = p.click_action(opener);
                if opened {
                    info!(%channel, id = p.announcement().id, "announcement link opened");
                }
                opened
            }
            None => false,
        }
    }

    /// Tear down: cancel all pending timers and drop every presenter.
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.timers.cancel_all();
        self.presenters.clear();
        info!("announcement scheduler shut down");
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Close callback: persist the dismissal and move the channel on.
    fn on_close(&mut self, channel: ItemType, id: AnnouncementId) {
        self.store.add_dismissed_id(id);

        let len = self.queue(channel).len();
        let delay = self.config.timing.sequential_delay(channel);
        let Some(state) = self.channels.get_mut(&channel) else {
            return;
        };
        state.visible = false;
        if state.current_index + 1 < len {
            state.phase = ChannelPhase::Advancing;
            self.timers.schedule_once(TimerKey::Advance(channel), delay);
            info!(%channel, id, "announcement dismissed, next item scheduled");
        } else {
            state.phase = ChannelPhase::Exhausted;
            info!(%channel, id, "announcement dismissed, channel exhausted");
        }
        self.sync_presenters();
    }

    /// Mount presenters for channels that became rendered and unmount those
    /// that stopped being rendered.
    fn sync_presenters(&mut self) {
        for channel in ItemType::ALL {
            let rendered = self.is_rendered(channel);
            let mounted = self.presenters.contains_key(&channel);

            if rendered && !mounted {
                let index = self.channel_state(channel).current_index;
                let Some(announcement) = self.queue(channel).get(index).cloned() else {
                    continue;
                };
                debug!(%channel, id = announcement.id, "presenter mounted");
                let presenter =
                    Presenter::mount(channel, announcement, &self.config.timing, &mut self.timers);
                self.presenters.insert(channel, presenter);
            } else if !rendered && mounted {
                let Some(mut presenter) = self.presenters.remove(&channel) else {
                    continue;
                };
                // A suppressed presenter that was already closing completes its
                // close now so the dismissal is not lost.
                let closing = presenter.finish_close();
                presenter.unmount(&mut self.timers);
                debug!(%channel, id = presenter.announcement().id, "presenter unmounted");
                if let Some(id) = closing {
                    self.on_close(channel, id);
                    return;
                }
            }
        }
    }
}

impl<T: TimerDriver> Drop for AnnouncementScheduler<T> {
    fn drop(&mut self) {
        self.timers.cancel_all();
    }
}
