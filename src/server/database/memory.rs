use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::server::controller::error::CoreError;
use crate::server::database::{ensure_billable, Store};
use crate::server::model::bill::{Bill, BillFilter, BillId, BillStatus};
use crate::server::model::booking::{Booking, BookingFilter, BookingId, BookingStatus};
use crate::server::model::order::{Order, OrderFilter, OrderId, OrderStatus, PaymentStatus};
use crate::server::model::CommonRequestParams;

/// Insertion-ordered table.
struct Table<K, V> {
    rows: HashMap<K, V>,
    order: Vec<K>,
}

impl<K: Copy + Eq + std::hash::Hash, V: Clone> Table<K, V> {
    fn new() -> Self {
        Self { rows: HashMap::new(), order: Vec::new() }
    }

    fn insert(&mut self, key: K, value: V) -> Result<(), CoreError> {
        if self.rows.contains_key(&key) {
            return Err(CoreError::persistence("duplicate primary key"));
        }
        self.rows.insert(key, value);
        self.order.push(key);
        Ok(())
    }

    fn remove(&mut self, key: &K) {
        if self.rows.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    /// newest first
    fn page(&self, keep: impl Fn(&V) -> bool, page: CommonRequestParams) -> Vec<V> {
        let (offset, limit) = page.window();
        self.order
            .iter()
            .rev()
            .filter_map(|k| self.rows.get(k))
            .filter(|v| keep(v))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

struct Tables {
    orders: Table<OrderId, Order>,
    bills: Table<BillId, Bill>,
    bookings: Table<BookingId, Booking>,
}

/// Process-local store. Every operation runs under one lock, which makes the
/// batch operations trivially atomic.
#[derive(Clone)]
pub(crate) struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    #[cfg(test)]
    fail_next_mark_billed: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables {
                orders: Table::new(),
                bills: Table::new(),
                bookings: Table::new(),
            })),
            #[cfg(test)]
            fail_next_mark_billed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// makes the next `mark_billed` fail with a store error
    #[cfg(test)]
    pub fn fail_next_mark_billed(&self) {
        self.fail_next_mark_billed.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, CoreError> {
        self.tables
            .read()
            .map_err(|_| CoreError::persistence("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, CoreError> {
        self.tables
            .write()
            .map_err(|_| CoreError::persistence("memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), CoreError> {
        self.write()?.orders.insert(order.id, order.clone())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, CoreError> {
        Ok(self.read()?.orders.rows.get(&id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter, page: CommonRequestParams) -> Result<Vec<Order>, CoreError> {
        Ok(self.read()?.orders.page(|o| filter.matches(o), page))
    }

    async fn billable_orders(&self) -> Result<Vec<Order>, CoreError> {
        let tables = self.read()?;
        Ok(tables
            .orders
            .order
            .iter()
            .rev()
            .filter_map(|id| tables.orders.rows.get(id))
            .filter(|o| o.bill_id.is_none() && o.status.is_billable())
            .cloned()
            .collect())
    }

    async fn summarize_orders(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<(u64, Decimal), CoreError> {
        let tables = self.read()?;
        Ok(tables
            .orders
            .rows
            .values()
            .filter(|o| o.created_at >= from && o.created_at < until)
            .fold((0, Decimal::ZERO), |(count, revenue), o| match o.status {
                OrderStatus::Cancelled => (count + 1, revenue),
                _ => (count + 1, revenue + o.total),
            }))
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        (status, version): (OrderStatus, u64),
        next: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order, CoreError> {
        let mut tables = self.write()?;
        let order = tables
            .orders
            .rows
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("order", id))?;
        if order.status != status || order.version != version {
            return Err(CoreError::conflict(format!(
                "order {} was changed concurrently and is now {}",
                id, order.status
            )));
        }
        order.status = next;
        order.version += 1;
        order.updated_at = Some(at);
        Ok(order.clone())
    }

    async fn mark_billed(&self, ids: &[OrderId], bill_id: BillId, at: DateTime<Utc>) -> Result<Vec<Order>, CoreError> {
        let mut tables = self.write()?;
        #[cfg(test)]
        if self.fail_next_mark_billed.swap(false, Ordering::SeqCst) {
            return Err(CoreError::persistence("injected mark_billed failure"));
        }
        for id in ids {
            let order = tables
                .orders
                .rows
                .get(id)
                .ok_or_else(|| CoreError::not_found("order", id))?;
            ensure_billable(order)?;
        }
        let mut billed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = tables.orders.rows.get_mut(id) {
                order.status = OrderStatus::Billed;
                order.bill_id = Some(bill_id);
                order.version += 1;
                order.updated_at = Some(at);
                billed.push(order.clone());
            }
        }
        Ok(billed)
    }

    async fn insert_bill(&self, bill: &Bill) -> Result<(), CoreError> {
        self.write()?.bills.insert(bill.id, bill.clone())
    }

    async fn delete_bill(&self, id: BillId) -> Result<(), CoreError> {
        self.write()?.bills.remove(&id);
        Ok(())
    }

    async fn get_bill(&self, id: BillId) -> Result<Option<Bill>, CoreError> {
        Ok(self.read()?.bills.rows.get(&id).cloned())
    }

    async fn list_bills(&self, filter: BillFilter, page: CommonRequestParams) -> Result<Vec<Bill>, CoreError> {
        Ok(self
            .read()?
            .bills
            .page(|b| filter.status.map_or(true, |s| b.status == s), page))
    }

    async fn mark_bill_paid(&self, id: BillId, payment_ref: &str, at: DateTime<Utc>) -> Result<Bill, CoreError> {
        let mut tables = self.write()?;
        let bill = tables
            .bills
            .rows
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("bill", id))?;
        if bill.status != BillStatus::Unpaid {
            return Err(CoreError::conflict(format!("bill {id} was paid concurrently")));
        }
        bill.status = BillStatus::Paid;
        bill.payment_ref = Some(payment_ref.to_string());
        bill.paid_at = Some(at);
        let paid = bill.clone();
        for order_id in &paid.order_ids {
            if let Some(order) = tables.orders.rows.get_mut(order_id) {
                order.payment_status = PaymentStatus::Paid;
                order.updated_at = Some(at);
            }
        }
        Ok(paid)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), CoreError> {
        self.write()?.bookings.insert(booking.id, booking.clone())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>, CoreError> {
        Ok(self.read()?.bookings.rows.get(&id).cloned())
    }

    async fn list_bookings(&self, filter: BookingFilter, page: CommonRequestParams) -> Result<Vec<Booking>, CoreError> {
        Ok(self
            .read()?
            .bookings
            .page(|b| filter.status.map_or(true, |s| b.status == s), page))
    }

    async fn update_booking_status(
        &self,
        id: BookingId,
        (status, version): (BookingStatus, u64),
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<Booking, CoreError> {
        let mut tables = self.write()?;
        let booking = tables
            .bookings
            .rows
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("booking", id))?;
        if booking.status != status || booking.version != version {
            return Err(CoreError::conflict(format!(
                "booking {} was changed concurrently and is now {}",
                id, booking.status
            )));
        }
        booking.status = next;
        booking.version += 1;
        booking.updated_at = Some(at);
        Ok(booking.clone())
    }
}
