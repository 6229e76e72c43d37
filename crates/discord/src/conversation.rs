//! One-shot reply listeners keyed by conversation and author.
//!
//! A listener is registered before its prompt is posted, so a reply that
//! arrives immediately still resolves it. Only the first matching message is
//! delivered; anything after that is dropped rather than queued for a later
//! step. Dropping a [`ReplyListener`] removes its entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ticketbooth_core::{ChannelId, UserId};
use tokio::sync::oneshot;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ListenerKey {
    channel: ChannelId,
    author: UserId,
}

struct ListenerSlot {
    id: u64,
    sender: oneshot::Sender<String>,
}

type ListenerMap = HashMap<ListenerKey, ListenerSlot>;

#[derive(Default)]
pub struct ReplyHub {
    listeners: Arc<Mutex<ListenerMap>>,
    next_id: AtomicU64,
}

impl ReplyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts listening for the next message `author` sends in `channel`.
    /// Replaces any listener already waiting on the same pair.
    pub fn register(&self, channel: &ChannelId, author: &UserId) -> ReplyListener {
        let (sender, receiver) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = ListenerKey { channel: channel.clone(), author: author.clone() };

        lock(&self.listeners).insert(key.clone(), ListenerSlot { id, sender });
        ReplyListener { key, id, receiver, listeners: Arc::clone(&self.listeners) }
    }

    /// Hands `content` to the matching listener. Returns `false` when nobody
    /// is waiting, in which case the message is discarded.
    pub fn offer(&self, channel: &ChannelId, author: &UserId, content: &str) -> bool {
        let key = ListenerKey { channel: channel.clone(), author: author.clone() };
        let Some(slot) = lock(&self.listeners).remove(&key) else {
            return false;
        };
        slot.sender.send(content.to_owned()).is_ok()
    }

    pub fn pending(&self) -> usize {
        lock(&self.listeners).len()
    }
}

pub struct ReplyListener {
    key: ListenerKey,
    id: u64,
    receiver: oneshot::Receiver<String>,
    listeners: Arc<Mutex<ListenerMap>>,
}

impl ReplyListener {
    /// Resolves with the reply text, or `None` if a newer listener replaced
    /// this one.
    pub async fn next_reply(&mut self) -> Option<String> {
        (&mut self.receiver).await.ok()
    }
}

impl Drop for ReplyListener {
    fn drop(&mut self) {
        let mut listeners = lock(&self.listeners);
        if listeners.get(&self.key).is_some_and(|slot| slot.id == self.id) {
            listeners.remove(&self.key);
        }
    }
}

fn lock(listeners: &Mutex<ListenerMap>) -> MutexGuard<'_, ListenerMap> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ticketbooth_core::{ChannelId, UserId};

    use super::ReplyHub;

    fn channel() -> ChannelId {
        ChannelId::new("C-lobby")
    }

    fn ash() -> UserId {
        UserId::new("U-ash")
    }

    #[tokio::test]
    async fn reply_sent_before_await_is_not_lost() {
        let hub = ReplyHub::new();
        let mut listener = hub.register(&channel(), &ash());

        assert!(hub.offer(&channel(), &ash(), "XYZ"));
        assert_eq!(listener.next_reply().await.as_deref(), Some("XYZ"));
        assert_eq!(hub.pending(), 0);
    }

    #[tokio::test]
    async fn other_authors_and_channels_never_match() {
        let hub = ReplyHub::new();
        let _listener = hub.register(&channel(), &ash());

        assert!(!hub.offer(&channel(), &UserId::new("U-misty"), "hi"));
        assert!(!hub.offer(&ChannelId::new("C-other"), &ash(), "hi"));
        assert_eq!(hub.pending(), 1);
    }

    #[tokio::test]
    async fn only_first_message_resolves_and_extras_are_dropped() {
        let hub = ReplyHub::new();
        let mut listener = hub.register(&channel(), &ash());

        assert!(hub.offer(&channel(), &ash(), "first"));
        assert!(!hub.offer(&channel(), &ash(), "second"));
        assert_eq!(listener.next_reply().await.as_deref(), Some("first"));

        let mut next = hub.register(&channel(), &ash());
        let waited = tokio::time::timeout(Duration::from_millis(10), next.next_reply()).await;
        assert!(waited.is_err(), "the dropped message must not leak into the next step");
    }

    #[tokio::test]
    async fn dropping_a_listener_deregisters_it() {
        let hub = ReplyHub::new();
        let listener = hub.register(&channel(), &ash());
        assert_eq!(hub.pending(), 1);

        drop(listener);
        assert_eq!(hub.pending(), 0);
        assert!(!hub.offer(&channel(), &ash(), "late"));
    }

    #[tokio::test]
    async fn replaced_listener_resolves_none_and_keeps_the_newer_entry() {
        let hub = ReplyHub::new();
        let mut stale = hub.register(&channel(), &ash());
        let _fresh = hub.register(&channel(), &ash());

        assert_eq!(stale.next_reply().await, None);
        drop(stale);
        assert_eq!(hub.pending(), 1);
    }
}
