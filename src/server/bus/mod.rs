//! Room-scoped fan-out of lifecycle events.
//!
//! ```text
//! OrderService / BillAggregator / BookingService
//!        │ publish(DomainEvent)
//!        ▼
//! NotificationBus
//!   └── rooms: Room -> broadcast::Sender<Arc<Notification>>
//!          ├── admin            (staff dashboards)
//!          └── session:<key>    (customer trackers)
//! ```
//!
//! Nothing is persisted. A subscriber that reconnects must re-read the lists.

use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::server::model::event::{DomainEvent, Notification, Room};
use crate::server::util::time;

/// Publishing side handed to the services.
pub(crate) trait Notifier: Send + Sync {
    /// Never blocks and never fails; undeliverable events are dropped.
    fn publish(&self, event: DomainEvent);
}

#[derive(Clone)]
pub(crate) struct NotificationBus {
    rooms: Arc<DashMap<Room, broadcast::Sender<Arc<Notification>>>>,
    capacity: usize,
}

impl NotificationBus {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Joins `room`; leaving happens when the subscription is dropped.
    pub fn subscribe(&self, room: Room) -> Subscription {
        let rx = self
            .rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        debug!("subscriber joined room={}", room);
        Subscription { room, rx }
    }

    fn publish_to(&self, room: Room, event: &DomainEvent) {
        let Some(tx) = self.rooms.get(&room) else {
            return;
        };
        let notification = Arc::new(Notification {
            room: room.clone(),
            published_at: time::helper::get_utc_now(),
            event: event.clone(),
        });
        // Err only means every subscriber left since the last sweep
        if tx.send(notification).is_err() {
            debug!("room={} has no subscribers, dropped {}", room, event.name());
        }
    }

    pub fn subscriber_count(&self, room: &Room) -> usize {
        self.rooms.get(room).map_or(0, |tx| tx.receiver_count())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drops rooms nobody listens to; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|_, tx| tx.receiver_count() > 0);
        before - self.rooms.len()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Notifier for NotificationBus {
    fn publish(&self, event: DomainEvent) {
        for room in event.rooms() {
            self.publish_to(room, &event);
        }
    }
}

/// One connection's membership in a room.
pub(crate) struct Subscription {
    room: Room,
    rx: broadcast::Receiver<Arc<Notification>>,
}

impl Subscription {
    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Next notification in publish order, `None` once the bus is gone.
    /// A subscriber that fell behind skips what it missed.
    pub async fn next(&mut self) -> Option<Arc<Notification>> {
        loop {
            match self.rx.recv().await {
                Ok(notification) => return Some(notification),
                Err(RecvError::Lagged(missed)) => {
                    warn!("subscriber in room={} lagged, {} notifications skipped", self.room, missed);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::model::booking::{Booking, BookingStatus, BookingType};
    use chrono::{NaiveDate, Utc};
    use std::time::Duration;
    use uuid::Uuid;

    fn booking(guests: u32) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            booking_type: BookingType::Table,
            customer_name: "Ravi".to_string(),
            phone: "98450".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time: "19:30".to_string(),
            guests,
            event_details: None,
            status: BookingStatus::Pending,
            version: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn delivers_in_publish_order_to_room_members_only() {
        let bus = NotificationBus::default();
        let mut admin = bus.subscribe(Room::Admin);
        let mut table = bus.subscribe(Room::Session("T1".to_string()));

        bus.publish(DomainEvent::BookingCreated(booking(2)));
        bus.publish(DomainEvent::BookingStatusChanged(booking(4)));

        assert_eq!(admin.next().await.unwrap().event.name(), "booking.created");
        assert_eq!(admin.next().await.unwrap().event.name(), "booking.status_changed");
        let nothing = tokio::time::timeout(Duration::from_millis(20), table.next()).await;
        assert!(nothing.is_err(), "bookings are not routed to table rooms");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_a_no_op() {
        let bus = NotificationBus::default();
        bus.publish(DomainEvent::BookingCreated(booking(2)));
        assert_eq!(bus.room_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_and_continues() {
        let bus = NotificationBus::new(2);
        let mut slow = bus.subscribe(Room::Admin);
        for guests in 1..=5 {
            bus.publish(DomainEvent::BookingCreated(booking(guests)));
        }
        let next = slow.next().await.unwrap();
        match &next.event {
            DomainEvent::BookingCreated(b) => assert_eq!(b.guests, 4),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn sweep_drops_abandoned_rooms() {
        let bus = NotificationBus::default();
        let kept = bus.subscribe(Room::Admin);
        drop(bus.subscribe(Room::Session("T9".to_string())));
        assert_eq!(bus.room_count(), 2);
        assert_eq!(bus.sweep(), 1);
        assert_eq!(bus.subscriber_count(kept.room()), 1);
        assert_eq!(bus.subscriber_count(&Room::Session("T9".to_string())), 0);
    }
}
