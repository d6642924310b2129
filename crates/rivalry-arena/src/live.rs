//! Per-match live-update fan-out.
//!
//! Listeners subscribe to one match and receive every [`MatchEvent`]
//! published for it after they subscribed. Delivery is at most once: there
//! is no backlog or replay, and events for matches with no listeners are
//! dropped. Dropping a [`Subscription`] unsubscribes it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use rivalry_types::{MatchEvent, MatchId};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Where the engine sends live updates.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &MatchEvent);
}

type Listeners = HashMap<MatchId, Vec<(u64, UnboundedSender<MatchEvent>)>>;

/// Registry of live listeners keyed by match.
#[derive(Debug, Default)]
pub struct LiveUpdates {
    listeners: RwLock<Listeners>,
    next_id: AtomicU64,
}

impl LiveUpdates {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start listening to one match.
    pub fn subscribe(self: &Arc<Self>, match_id: MatchId) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        match self.listeners.write() {
            Ok(mut listeners) => listeners.entry(match_id).or_default().push((id, tx)),
            Err(_) => tracing::error!(%match_id, "Live-update registry poisoned; subscription is inert"),
        }
        tracing::debug!(%match_id, listener = id, "Live-update listener attached");
        Subscription {
            registry: Arc::downgrade(self),
            match_id,
            id,
            receiver: rx,
        }
    }

    /// Number of listeners attached to a match.
    #[must_use]
    pub fn listener_count(&self, match_id: MatchId) -> usize {
        self.listeners
            .read()
            .map(|l| l.get(&match_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    fn unsubscribe(&self, match_id: MatchId, id: u64) {
        if let Ok(mut listeners) = self.listeners.write() {
            if let Some(list) = listeners.get_mut(&match_id) {
                list.retain(|(lid, _)| *lid != id);
                if list.is_empty() {
                    listeners.remove(&match_id);
                }
            }
        }
        tracing::debug!(%match_id, listener = id, "Live-update listener detached");
    }
}

impl EventSink for LiveUpdates {
    fn publish(&self, event: &MatchEvent) {
        let match_id = event.match_id();
        let Ok(listeners) = self.listeners.read() else {
            tracing::warn!(%match_id, "Live-update registry poisoned; event dropped");
            return;
        };
        let Some(list) = listeners.get(&match_id) else {
            return;
        };
        let delivered = list
            .iter()
            .filter(|(_, tx)| tx.send(event.clone()).is_ok())
            .count();
        tracing::debug!(%match_id, delivered, "Live update published");
    }
}

/// One listener's stream of events. Unsubscribes on drop.
#[derive(Debug)]
pub struct Subscription {
    registry: Weak<LiveUpdates>,
    match_id: MatchId,
    id: u64,
    receiver: UnboundedReceiver<MatchEvent>,
}

impl Subscription {
    #[must_use]
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<MatchEvent> {
        self.receiver.recv().await
    }

    /// The next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<MatchEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.match_id, self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use rivalry_types::MatchStatus;

    use super::*;

    fn status(match_id: MatchId) -> MatchEvent {
        MatchEvent::StatusUpdate {
            match_id,
            status: MatchStatus::Ongoing,
        }
    }

    #[test]
    fn only_listeners_of_that_match_receive() {
        let live = LiveUpdates::new();
        let (a, b) = (MatchId::new(), MatchId::new());
        let mut sub_a = live.subscribe(a);
        let mut sub_b = live.subscribe(b);

        live.publish(&status(a));
        assert_eq!(sub_a.try_recv(), Some(status(a)));
        assert_eq!(sub_a.try_recv(), None);
        assert_eq!(sub_b.try_recv(), None);
    }

    #[test]
    fn no_replay_for_late_subscribers() {
        let live = LiveUpdates::new();
        let m = MatchId::new();
        live.publish(&status(m));
        let mut late = live.subscribe(m);
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn drop_unsubscribes() {
        let live = LiveUpdates::new();
        let m = MatchId::new();
        let first = live.subscribe(m);
        let second = live.subscribe(m);
        assert_eq!(live.listener_count(m), 2);
        drop(first);
        assert_eq!(live.listener_count(m), 1);
        drop(second);
        assert_eq!(live.listener_count(m), 0);
    }

    #[test]
    fn subscription_outliving_registry_is_harmless() {
        let live = LiveUpdates::new();
        let sub = live.subscribe(MatchId::new());
        drop(live);
        drop(sub);
    }
}
