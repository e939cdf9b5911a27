use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use log::{error, info, warn};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::server::bus::Notifier;
use crate::server::controller::error::CoreError;
use crate::server::database::{ensure_billable, Store};
use crate::server::model::bill::{Bill, BillFilter, BillGroup, BillId, BillMeta, BillStatus};
use crate::server::model::event::DomainEvent;
use crate::server::model::order::{Order, OrderId};
use crate::server::model::principal::Principal;
use crate::server::model::CommonRequestParams;
use crate::server::service::orders::OrderService;
use crate::server::util::time;

/// Bill Aggregator: folds finished orders into one payable bill.
#[derive(Clone)]
pub(crate) struct BillAggregator<S: Store> {
    store: S,
    orders: OrderService<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> BillAggregator<S> {
    pub fn new(orders: OrderService<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store: orders.store().clone(),
            orders,
            notifier,
        }
    }

    /// Creates a bill over `order_ids` and marks those orders billed.
    ///
    /// The bill row is written first; if the orders cannot all be marked the
    /// row is deleted again and the marking error is returned.
    pub async fn create_bill(
        &self,
        principal: &Principal,
        order_ids: Vec<OrderId>,
        meta: BillMeta,
    ) -> Result<Bill, CoreError> {
        principal.require_staff("create bills")?;
        if order_ids.is_empty() {
            return Err(CoreError::validation("a bill needs at least one order"));
        }
        let mut seen = HashSet::with_capacity(order_ids.len());
        if let Some(dup) = order_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(CoreError::validation(format!("order {dup} is listed twice")));
        }

        let mut orders = Vec::with_capacity(order_ids.len());
        for id in &order_ids {
            let order = self.orders.get_order(*id).await?;
            ensure_billable(&order).inspect_err(|e| warn!("bill refused: {}", e))?;
            orders.push(order);
        }

        let bill = aggregate(Uuid::new_v4(), &orders, meta);
        self.store.insert_bill(&bill).await?;
        if let Err(e) = self.orders.mark_billed(&order_ids, bill.id).await {
            warn!("bill={} rolled back: {}", bill.id, e);
            if let Err(rollback) = self.store.delete_bill(bill.id).await {
                error!("bill={} could not be rolled back, {}", bill.id, rollback);
            }
            return Err(e);
        }

        info!(
            "bill={} created over {} orders, total={}",
            bill.id,
            bill.order_ids.len(),
            bill.total
        );
        self.notifier.publish(DomainEvent::BillCreated(bill.clone()));
        Ok(bill)
    }

    pub async fn mark_paid(&self, principal: &Principal, id: BillId, payment_ref: &str) -> Result<Bill, CoreError> {
        principal.require_staff("settle bills")?;
        let payment_ref = payment_ref.trim();
        if payment_ref.is_empty() {
            return Err(CoreError::validation("a payment reference is required"));
        }
        let bill = self.get_bill(principal, id).await?;
        if bill.status == BillStatus::Paid {
            warn!("bill={} already paid", id);
            return Err(CoreError::invalid_transition(format!("bill {id} is already paid")));
        }
        let paid = self
            .store
            .mark_bill_paid(id, payment_ref, time::helper::get_utc_now())
            .await?;
        info!("bill={} paid, ref={}", id, payment_ref);
        self.notifier.publish(DomainEvent::BillPaid(paid.clone()));
        Ok(paid)
    }

    pub async fn get_bill(&self, principal: &Principal, id: BillId) -> Result<Bill, CoreError> {
        principal.require_staff("view bills")?;
        self.store
            .get_bill(id)
            .await?
            .ok_or_else(|| CoreError::not_found("bill", id))
    }

    pub async fn list_bills(
        &self,
        principal: &Principal,
        filter: BillFilter,
        page: CommonRequestParams,
    ) -> Result<Vec<Bill>, CoreError> {
        principal.require_staff("list bills")?;
        self.store.list_bills(filter, page).await
    }

    /// Unbilled, billable orders grouped the way the billing desk shows them.
    pub async fn candidates(&self, principal: &Principal) -> Result<Vec<BillGroup>, CoreError> {
        principal.require_staff("list billing candidates")?;
        Ok(group_unbilled(self.store.billable_orders().await?))
    }
}

/// Sums the orders' stored amounts; items are copied, never re-priced.
fn aggregate(id: BillId, orders: &[Order], meta: BillMeta) -> Bill {
    let first = orders.first();
    Bill {
        id,
        order_ids: orders.iter().map(|o| o.id).collect(),
        items: orders.iter().flat_map(|o| o.items.iter().cloned()).collect(),
        subtotal: orders.iter().map(|o| o.subtotal).sum(),
        tax: orders.iter().map(|o| o.tax).sum(),
        total: orders.iter().map(|o| o.total).sum(),
        customer_name: first.map(|o| o.customer.name.clone()),
        customer_phone: first.map(|o| o.customer.phone.clone()),
        table_id: first.and_then(|o| o.table_id.clone()),
        status: BillStatus::Unpaid,
        payment_ref: None,
        notes: meta.notes.filter(|n| !n.trim().is_empty()),
        created_by: meta.created_by,
        created_at: time::helper::get_utc_now(),
        paid_at: None,
    }
}

/// Groups by table, then customer name, then `Other`. Display only.
pub(crate) fn group_unbilled(orders: Vec<Order>) -> Vec<BillGroup> {
    let mut groups: BTreeMap<String, Vec<Order>> = BTreeMap::new();
    for order in orders {
        let label = match (&order.table_id, order.customer.name.trim()) {
            (Some(table_id), _) => format!("Table {table_id}"),
            (None, "") => "Other".to_string(),
            (None, name) => name.to_string(),
        };
        groups.entry(label).or_default().push(order);
    }
    groups
        .into_iter()
        .map(|(label, orders)| BillGroup {
            subtotal: orders.iter().map(|o| o.subtotal).sum::<Decimal>(),
            total: orders.iter().map(|o| o.total).sum::<Decimal>(),
            label,
            orders,
        })
        .collect()
}
