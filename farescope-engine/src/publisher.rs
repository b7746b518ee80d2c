use std::collections::HashMap;

use tokio::sync::{broadcast, RwLock};
use tracing::trace;
use uuid::Uuid;

use farescope_core::{SearchEvent, SystemNotice};

const ROOM_CAPACITY: usize = 64;
const SYSTEM_CAPACITY: usize = 100;

/// Pushes state-change events to subscribers grouped by search id.
///
/// Delivery is at-most-once and best-effort per receiver: no subscriber, a
/// lagging receiver, or a closed room all lose the event silently. Clients
/// reconcile by reading the progress snapshot after reconnecting. A separate
/// broadcast channel carries system-wide notices, decoupled from rooms.
pub struct ProgressPublisher {
    rooms: RwLock<HashMap<Uuid, broadcast::Sender<SearchEvent>>>,
    system_tx: broadcast::Sender<SystemNotice>,
}

impl ProgressPublisher {
    pub fn new() -> Self {
        let (system_tx, _) = broadcast::channel(SYSTEM_CAPACITY);
        Self {
            rooms: RwLock::new(HashMap::new()),
            system_tx,
        }
    }

    /// Subscribe to one search's events, lazily creating its room.
    /// Leaving is simply dropping the receiver.
    pub async fn join(&self, search_id: Uuid) -> broadcast::Receiver<SearchEvent> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(search_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    pub async fn publish(&self, search_id: Uuid, event: SearchEvent) {
        let rooms = self.rooms.read().await;
        if let Some(tx) = rooms.get(&search_id) {
            let delivered = tx.send(event).unwrap_or(0);
            trace!(
                "Delivered event to {} subscribers of search {}",
                delivered,
                search_id
            );
        }
    }

    /// Drop a search's room once the search is evicted
    pub async fn close(&self, search_id: Uuid) {
        self.rooms.write().await.remove(&search_id);
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Broadcast-to-all path for system-wide notices
    pub fn broadcast(&self, notice: SystemNotice) {
        let _ = self.system_tx.send(notice);
    }

    pub fn subscribe_system(&self) -> broadcast::Receiver<SystemNotice> {
        self.system_tx.subscribe()
    }
}

impl Default for ProgressPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farescope_core::NoticeLevel;

    #[tokio::test]
    async fn test_room_delivery_is_scoped_to_search() {
        let publisher = ProgressPublisher::new();
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut rx = publisher.join(watched).await;
        publisher
            .publish(other, SearchEvent::Cancelled { search_id: other })
            .await;
        publisher
            .publish(watched, SearchEvent::Cancelled { search_id: watched })
            .await;

        match rx.recv().await.unwrap() {
            SearchEvent::Cancelled { search_id } => assert_eq!(search_id, watched),
            event => panic!("unexpected event: {:?}", event),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_best_effort() {
        let publisher = ProgressPublisher::new();
        let search_id = Uuid::new_v4();

        // No room, then a closed room: neither publish may fail
        publisher
            .publish(search_id, SearchEvent::Cancelled { search_id })
            .await;
        let rx = publisher.join(search_id).await;
        drop(rx);
        publisher
            .publish(search_id, SearchEvent::Cancelled { search_id })
            .await;

        publisher.close(search_id).await;
        assert_eq!(publisher.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_system_notices_reach_all_subscribers() {
        let publisher = ProgressPublisher::new();
        let mut first = publisher.subscribe_system();
        let mut second = publisher.subscribe_system();

        publisher.broadcast(SystemNotice::warning("degraded source coverage"));

        assert_eq!(first.recv().await.unwrap().level, NoticeLevel::Warning);
        assert_eq!(second.recv().await.unwrap().level, NoticeLevel::Warning);
    }
}
