//! Persistence for orders, bills and bookings.

pub(crate) mod connection;
pub(crate) mod memory;
pub(crate) mod pool;
pub(crate) mod pool_config;
pub(crate) mod postgres;

use std::future::Future;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::server::controller::error::CoreError;
use crate::server::database::memory::MemoryStore;
use crate::server::database::postgres::PgStore;
use crate::server::model::bill::{Bill, BillFilter, BillId};
use crate::server::model::booking::{Booking, BookingFilter, BookingId, BookingStatus};
use crate::server::model::order::{Order, OrderFilter, OrderId, OrderStatus};
use crate::server::model::CommonRequestParams;

/// Record storage behind the order/bill/booking services.
///
/// Listings are most recent first. Status writes are compare-and-swap on
/// `(status, version)` and fail with `Conflict` when another writer got there
/// first. `mark_billed` and `mark_bill_paid` are all-or-nothing.
pub(crate) trait Store: Clone + Send + Sync + 'static {
    fn insert_order(&self, order: &Order) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn get_order(&self, id: OrderId) -> impl Future<Output = Result<Option<Order>, CoreError>> + Send;

    fn list_orders(
        &self,
        filter: &OrderFilter,
        page: CommonRequestParams,
    ) -> impl Future<Output = Result<Vec<Order>, CoreError>> + Send;

    /// unbilled orders in a billable status
    fn billable_orders(&self) -> impl Future<Output = Result<Vec<Order>, CoreError>> + Send;

    /// `(orders created, revenue)` over `[from, until)`; cancelled orders add no revenue
    fn summarize_orders(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Future<Output = Result<(u64, Decimal), CoreError>> + Send;

    fn update_order_status(
        &self,
        id: OrderId,
        expected: (OrderStatus, u64),
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Order, CoreError>> + Send;

    /// Moves every order in `ids` to `billed` under `bill_id`, or none of them.
    fn mark_billed(
        &self,
        ids: &[OrderId],
        bill_id: BillId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Order>, CoreError>> + Send;

    fn insert_bill(&self, bill: &Bill) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn delete_bill(&self, id: BillId) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn get_bill(&self, id: BillId) -> impl Future<Output = Result<Option<Bill>, CoreError>> + Send;

    fn list_bills(
        &self,
        filter: BillFilter,
        page: CommonRequestParams,
    ) -> impl Future<Output = Result<Vec<Bill>, CoreError>> + Send;

    /// Flips an unpaid bill to paid and marks its orders paid.
    fn mark_bill_paid(
        &self,
        id: BillId,
        payment_ref: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Bill, CoreError>> + Send;

    fn insert_booking(&self, booking: &Booking) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn get_booking(&self, id: BookingId) -> impl Future<Output = Result<Option<Booking>, CoreError>> + Send;

    fn list_bookings(
        &self,
        filter: BookingFilter,
        page: CommonRequestParams,
    ) -> impl Future<Output = Result<Vec<Booking>, CoreError>> + Send;

    fn update_booking_status(
        &self,
        id: BookingId,
        expected: (BookingStatus, u64),
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Booking, CoreError>> + Send;
}

/// The store the running server was configured with.
#[derive(Clone)]
pub(crate) enum StoreBackend {
    Memory(MemoryStore),
    Postgres(PgStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            StoreBackend::Memory($store) => $call,
            StoreBackend::Postgres($store) => $call,
        }
    };
}

impl Store for StoreBackend {
    async fn insert_order(&self, order: &Order) -> Result<(), CoreError> {
        dispatch!(self, s => s.insert_order(order).await)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, CoreError> {
        dispatch!(self, s => s.get_order(id).await)
    }

    async fn list_orders(&self, filter: &OrderFilter, page: CommonRequestParams) -> Result<Vec<Order>, CoreError> {
        dispatch!(self, s => s.list_orders(filter, page).await)
    }

    async fn billable_orders(&self) -> Result<Vec<Order>, CoreError> {
        dispatch!(self, s => s.billable_orders().await)
    }

    async fn summarize_orders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<(u64, Decimal), CoreError> {
        dispatch!(self, s => s.summarize_orders(from, until).await)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: (OrderStatus, u64),
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order, CoreError> {
        dispatch!(self, s => s.update_order_status(id, expected, next, at).await)
    }

    async fn mark_billed(&self, ids: &[OrderId], bill_id: BillId, at: DateTime<Utc>) -> Result<Vec<Order>, CoreError> {
        dispatch!(self, s => s.mark_billed(ids, bill_id, at).await)
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<(), CoreError> {
        dispatch!(self, s => s.insert_bill(bill).await)
    }

    async fn delete_bill(&self, id: BillId) -> Result<(), CoreError> {
        dispatch!(self, s => s.delete_bill(id).await)
    }

    async fn get_bill(&self, id: BillId) -> Result<Option<Bill>, CoreError> {
        dispatch!(self, s => s.get_bill(id).await)
    }

    async fn list_bills(&self, filter: BillFilter, page: CommonRequestParams) -> Result<Vec<Bill>, CoreError> {
        dispatch!(self, s => s.list_bills(filter, page).await)
    }

    async fn mark_bill_paid(&self, id: BillId, payment_ref: &str, at: DateTime<Utc>) -> Result<Bill, CoreError> {
        dispatch!(self, s => s.mark_bill_paid(id, payment_ref, at).await)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), CoreError> {
        dispatch!(self, s => s.insert_booking(booking).await)
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, CoreError> {
        dispatch!(self, s => s.get_booking(id).await)
    }

    async fn list_bookings(&self, filter: BookingFilter, page: CommonRequestParams) -> Result<Vec<Booking>, CoreError> {
        dispatch!(self, s => s.list_bookings(filter, page).await)
    }

    async fn update_booking_status(
        &self,
        id: BookingId,
        expected: (BookingStatus, u64),
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Booking, CoreError> {
        dispatch!(self, s => s.update_booking_status(id, expected, next, at).await)
    }
}

/// An order may join a bill only once, and only from ready, served or delivered.
pub(crate) fn ensure_billable(order: &Order) -> Result<(), CoreError> {
    if let Some(bill_id) = order.bill_id {
        return Err(CoreError::conflict(format!(
            "order {} is already billed on bill {}",
            order.id, bill_id
        )));
    }
    if !order.status.is_billable() {
        return Err(CoreError::conflict(format!(
            "order {} is {}; only ready, served or delivered orders can be billed",
            order.id, order.status
        )));
    }
    Ok(())
}
