/// In-memory ordered message list for the active room.
///
/// The visible sequence is the history page followed by live events in arrival
/// order. Nothing is re-sorted by timestamp. Live events that arrive before the
/// history page resolves are held back and applied right after it, so a stale
/// snapshot can never land on top of newer events.
///
/// Every room entry opens a new epoch. Live handlers carry the epoch they were
/// registered under; `clear()` bumps it under the same lock `apply_incoming`
/// takes, so an update for a room that has been left is dropped. Messages that
/// name a room other than the current one are dropped as well; they can still be
/// in flight after a switch, before the server has processed the new join.
///
/// After a reconnect the session re-fetches history and merges it: ids not yet
/// seen are appended in server order, then the live events held meanwhile.

use crate::models::{Message, MessageId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Identifies one room visit; stale epochs are rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomEpoch(u64);

#[derive(Default)]
struct StoreInner {
    room: Option<String>,
    epoch: u64,
    history_loaded: bool,
    /// Live events received before history resolved
    pending: Vec<Message>,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
}

impl StoreInner {
    /// Append unless the id is already present. Messages without an id always go in.
    fn push(&mut self, message: Message) -> bool {
        if let Some(id) = message.known_id() {
            if !self.seen.insert(id.clone()) {
                log::debug!("Dropping duplicate message {}", id);
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.history_loaded = false;
        self.pending.clear();
        self.messages.clear();
        self.seen.clear();
    }
}

#[derive(Clone)]
pub struct MessageStore {
    inner: Arc<Mutex<StoreInner>>,
    snapshot_tx: Arc<watch::Sender<Vec<Message>>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        MessageStore {
            inner: Arc::new(Mutex::new(StoreInner::default())),
            snapshot_tx: Arc::new(snapshot_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &StoreInner) {
        self.snapshot_tx.send_replace(inner.messages.clone());
    }

    /// Start a fresh visit to `room`, dropping everything from the previous one
    pub fn begin_room(&self, room: &str) -> RoomEpoch {
        let mut inner = self.lock();
        inner.reset();
        inner.room = Some(room.to_string());
        self.publish(&inner);
        log::debug!("Message store entered room {} (epoch {})", room, inner.epoch);
        RoomEpoch(inner.epoch)
    }

    /// Empty the store; any handler still holding the old epoch becomes inert
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.reset();
        inner.room = None;
        self.publish(&inner);
    }

    pub fn current_epoch(&self) -> RoomEpoch {
        RoomEpoch(self.lock().epoch)
    }

    pub fn room(&self) -> Option<String> {
        self.lock().room.clone()
    }

    /// Replace the contents with the history page, then apply held-back live events
    pub fn load_history(&self, history: Vec<Message>) {
        let epoch = self.current_epoch();
        self.load_history_for(epoch, history);
    }

    /// Same as `load_history`, ignored if the store has moved past `epoch`
    pub fn load_history_for(&self, epoch: RoomEpoch, history: Vec<Message>) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch.0 {
            log::debug!("Ignoring history for stale epoch {}", epoch.0);
            return false;
        }

        inner.messages.clear();
        inner.seen.clear();
        for message in history {
            inner.push(message);
        }

        let pending = std::mem::take(&mut inner.pending);
        if !pending.is_empty() {
            log::debug!("Applying {} live messages held during history fetch", pending.len());
        }
        for message in pending {
            inner.push(message);
        }

        inner.history_loaded = true;
        self.publish(&inner);
        true
    }

    /// Append one live event
    pub fn apply_incoming(&self, message: Message) -> bool {
        let epoch = self.current_epoch();
        self.apply_incoming_for(epoch, message)
    }

    /// Append one live event delivered under `epoch`.
    /// Returns true when the visible list changed.
    pub fn apply_incoming_for(&self, epoch: RoomEpoch, message: Message) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch.0 {
            log::debug!("Dropping live message for stale epoch {}", epoch.0);
            return false;
        }
        if let Some(room) = inner.room.as_deref() {
            if !message.belongs_to(room) {
                log::debug!(
                    "Dropping message for room {:?} while in {}",
                    message.room,
                    room
                );
                return false;
            }
        }

        if !inner.history_loaded {
            inner.pending.push(message);
            return false;
        }

        let changed = inner.push(message);
        if changed {
            self.publish(&inner);
        }
        changed
    }

    /// Hold live events while a gap-filling history page is fetched.
    /// False when the store moved past `epoch` or has no history yet.
    pub fn begin_resync(&self, epoch: RoomEpoch) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch.0 || !inner.history_loaded {
            return false;
        }
        inner.history_loaded = false;
        true
    }

    /// Append history entries not seen yet, in server order, then the live
    /// events held since `begin_resync`. Entries without an id can't be matched
    /// against what is already shown and are skipped.
    pub fn merge_history_for(&self, epoch: RoomEpoch, history: Vec<Message>) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch.0 {
            log::debug!("Ignoring resync for stale epoch {}", epoch.0);
            return false;
        }

        let before = inner.messages.len();
        for message in history {
            if message.known_id().is_some() {
                inner.push(message);
            }
        }
        let recovered = inner.messages.len() - before;
        if recovered > 0 {
            log::info!("Recovered {} message(s) missed while offline", recovered);
        }

        let pending = std::mem::take(&mut inner.pending);
        for message in pending {
            inner.push(message);
        }

        inner.history_loaded = true;
        self.publish(&inner);
        true
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_history_loaded(&self) -> bool {
        self.lock().history_loaded
    }

    /// Receiver of the full ordered list after every change
    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.snapshot_tx.subscribe()
    }
}
