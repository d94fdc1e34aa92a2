use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::api::client::AnnouncementSource;
use crate::store::dismissal::DismissalStore;

use super::announcement::ItemType;
use super::presenter::LinkOpener;
use super::scheduler::{AnnouncementScheduler, Frame, SchedulerConfig};
use super::timers::TokioTimers;

/// Identifies one scheduling session (one page load, one tab).
pub type SessionId = Uuid;

/// User interaction forwarded to a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Close(ItemType),
    ClickAction(ItemType),
}

/// Handle to a scheduler running on its own task.
///
/// Dropping the handle or calling [`SchedulerHandle::shutdown`] unmounts the
/// scheduler and cancels every pending timer.
pub struct SchedulerHandle {
    session_id: SessionId,
    commands: mpsc::UnboundedSender<Command>,
    frames: watch::Receiver<Frame>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Close whatever is rendered on `channel`. Returns false once the
    /// scheduler has stopped.
    pub fn close(&self, channel: ItemType) -> bool {
        self.commands.send(Command::Close(channel)).is_ok()
    }

    pub fn click_action(&self, channel: ItemType) -> bool {
        self.commands.send(Command::ClickAction(channel)).is_ok()
    }

    /// The latest published frame.
    pub fn frame(&self) -> Frame {
        self.frames.borrow().clone()
    }

    /// Subscribe to frame changes.
    pub fn frames(&self) -> watch::Receiver<Frame> {
        self.frames.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Unmount the scheduler and wait for its task to end.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(session = %self.session_id, error = %e, "scheduler task failed");
        }
    }
}

/// Start a scheduling session: fetch once from `source`, then run the channel
/// state machines until `cancel` fires, the handle is shut down, or every
/// handle is dropped.
pub fn spawn_scheduler<S: AnnouncementSource>(
    source: S,
    store: DismissalStore,
    config: SchedulerConfig,
    opener: Arc<dyn LinkOpener>,
    cancel: CancellationToken,
) -> SchedulerHandle {
    let session_id = Uuid::new_v4();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (frames_tx, frames_rx) = watch::channel(Frame {
        loading: true,
        items: Vec::new(),
    });
    let cancel = cancel.child_token();

    let span = info_span!("announcements", session = %session_id);
    let task = tokio::spawn(
        run_session(
            source,
            store,
            config,
            opener,
            commands_rx,
            frames_tx,
            cancel.clone(),
        )
        .instrument(span),
    );

    SchedulerHandle {
        session_id,
        commands: commands_tx,
        frames: frames_rx,
        cancel,
        task,
    }
}

async fn run_session<S: AnnouncementSource>(
    source: S,
    store: DismissalStore,
    config: SchedulerConfig,
    opener: Arc<dyn LinkOpener>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    frames: watch::Sender<Frame>,
    cancel: CancellationToken,
) {
    let (timers, mut fired) = TokioTimers::new();
    let mut scheduler = AnnouncementScheduler::new(config, store, timers);

    let announcements = tokio::select! {
        _ = cancel.cancelled() => {
            info!("unmounted before announcements loaded");
            scheduler.shutdown();
            return;
        }
        result = source.fetch_published() => match result {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "failed to load announcements, showing none");
                Vec::new()
            }
        },
    };
    scheduler.on_loaded(announcements);
    publish(&frames, &scheduler);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(event) = fired.recv() => {
                if scheduler.timers_mut().accept(event) {
                    scheduler.on_timer(event.key);
                }
            }
            command = commands.recv() => match command {
                Some(Command::Close(channel)) => {
                    scheduler.request_close(channel);
                }
                Some(Command::ClickAction(channel)) => {
                    scheduler.click_action(channel, opener.as_ref());
                }
                None => break,
            },
        }
        publish(&frames, &scheduler);
    }

    scheduler.shutdown();
    publish(&frames, &scheduler);
}

fn publish(frames: &watch::Sender<Frame>, scheduler: &AnnouncementScheduler<TokioTimers>) {
    let next = scheduler.frame();
    frames.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
