//! Outbound notification seam between the game core and its transports
//!
//! The round clock calls a [`StateBroadcaster`] synchronously after each
//! mutation. Implementations must not block: they hand the owned snapshot to
//! whatever does the actual delivery and return immediately. The UDP
//! implementation lives with the transport in `network`.

use crowdmaze_shared::GameSnapshot;
use std::sync::Mutex;

pub trait StateBroadcaster {
    /// Delivers a snapshot to every connected session, fire-and-forget.
    fn broadcast(&self, snapshot: GameSnapshot);

    fn notify_participant_count(&self, count: u32);
}

/// A notification captured by [`RecordingBroadcaster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    State(GameSnapshot),
    Players(u32),
}

/// Keeps every notification in memory instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything recorded so far.
    pub fn drain(&self) -> Vec<Notification> {
        match self.notifications.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    fn push(&self, notification: Notification) {
        match self.notifications.lock() {
            Ok(mut guard) => guard.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}

impl StateBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, snapshot: GameSnapshot) {
        self.push(Notification::State(snapshot));
    }

    fn notify_participant_count(&self, count: u32) {
        self.push(Notification::Players(count));
    }
}
