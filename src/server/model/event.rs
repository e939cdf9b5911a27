use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::model::bill::Bill;
use crate::server::model::booking::Booking;
use crate::server::model::order::Order;

/// Scope a notification is routed to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Room {
    /// staff dashboards
    Admin,
    /// a table label or an order id, followed by customer trackers
    Session(String),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Admin => write!(f, "admin"),
            Room::Session(key) => write!(f, "session:{key}"),
        }
    }
}

impl Serialize for Room {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Lifecycle events, each carrying the full updated entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub(crate) enum DomainEvent {
    #[serde(rename = "order.created")]
    OrderCreated(Order),
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged(Order),
    #[serde(rename = "bill.created")]
    BillCreated(Bill),
    #[serde(rename = "bill.paid")]
    BillPaid(Bill),
    #[serde(rename = "booking.created")]
    BookingCreated(Booking),
    #[serde(rename = "booking.status_changed")]
    BookingStatusChanged(Booking),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_) => "order.created",
            DomainEvent::OrderStatusChanged(_) => "order.status_changed",
            DomainEvent::BillCreated(_) => "bill.created",
            DomainEvent::BillPaid(_) => "bill.paid",
            DomainEvent::BookingCreated(_) => "booking.created",
            DomainEvent::BookingStatusChanged(_) => "booking.status_changed",
        }
    }

    /// Rooms that must see this event.
    pub fn rooms(&self) -> Vec<Room> {
        match self {
            DomainEvent::OrderCreated(order) | DomainEvent::OrderStatusChanged(order) => {
                vec![Room::Session(order.session_key()), Room::Admin]
            }
            DomainEvent::BillCreated(bill) | DomainEvent::BillPaid(bill) => {
                let mut rooms = vec![Room::Admin];
                if let Some(table_id) = &bill.table_id {
                    rooms.push(Room::Session(table_id.clone()));
                }
                rooms
            }
            DomainEvent::BookingCreated(_) | DomainEvent::BookingStatusChanged(_) => vec![Room::Admin],
        }
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Notification {
    pub room: Room,
    pub published_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}
