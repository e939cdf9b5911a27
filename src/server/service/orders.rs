use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use log::{info, warn};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::server::bus::Notifier;
use crate::server::controller::error::CoreError;
use crate::server::database::Store;
use crate::server::model::bill::BillId;
use crate::server::model::event::DomainEvent;
use crate::server::model::item::Item;
use crate::server::model::order::{
    Order, OrderFilter, OrderId, OrderStatus, OrderSummary, OrderType, PatchOrderStatusRequest, PaymentStatus,
    PostOrderRequest,
};
use crate::server::model::principal::Principal;
use crate::server::model::CommonRequestParams;
use crate::server::service::menu::MenuCatalog;
use crate::server::service::status;
use crate::server::util::time;

/// 5%
pub(crate) const TAX_RATE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

/// `(subtotal, tax, total)` of a set of lines, tax rounded to paise.
pub(crate) fn price(items: &[Item]) -> (Decimal, Decimal, Decimal) {
    let subtotal: Decimal = items.iter().map(Item::line_total).sum();
    let tax = (subtotal * TAX_RATE).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (subtotal, tax, subtotal + tax)
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

/// Order Store: creation, reads and the staff-driven status lifecycle.
#[derive(Clone)]
pub(crate) struct OrderService<S: Store> {
    store: S,
    menu: Arc<dyn MenuCatalog>,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> OrderService<S> {
    pub fn new(store: S, menu: Arc<dyn MenuCatalog>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, menu, notifier }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Prices the request against the menu and stores a `pending` order.
    pub async fn create_order(&self, principal: &Principal, req: PostOrderRequest) -> Result<Order, CoreError> {
        let items = self.price_items(&req)?;
        match req.order_type {
            OrderType::Table if is_blank(req.table_id.as_deref()) => {
                return Err(CoreError::validation("table orders need a tableId"));
            }
            OrderType::Delivery if is_blank(req.customer.address.as_deref()) => {
                return Err(CoreError::validation("delivery orders need a customer address"));
            }
            _ => {}
        }
        if is_blank(Some(&req.customer.name)) || is_blank(Some(&req.customer.phone)) {
            return Err(CoreError::validation("customer name and phone are required"));
        }

        let (subtotal, tax, total) = price(&items);
        let order = Order {
            id: Uuid::new_v4(),
            order_type: req.order_type,
            table_id: match req.order_type {
                OrderType::Table => req.table_id.map(|t| t.trim().to_string()),
                OrderType::Delivery => None,
            },
            customer: req.customer,
            items,
            subtotal,
            tax,
            total,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            payment_method: req.payment_method,
            bill_id: None,
            version: 0,
            created_at: time::helper::get_utc_now(),
            updated_at: None,
        };
        self.store.insert_order(&order).await?;
        info!(
            "order={} created by {} ({}, total={}) at {}",
            order.id,
            principal.id,
            order.order_type,
            order.total,
            time::format_ts(&order.created_at)
        );
        self.notifier.publish(DomainEvent::OrderCreated(order.clone()));
        Ok(order)
    }

    fn price_items(&self, req: &PostOrderRequest) -> Result<Vec<Item>, CoreError> {
        if req.items.is_empty() {
            return Err(CoreError::validation("an order needs at least one item"));
        }
        req.items
            .iter()
            .map(|line| {
                if line.quantity < 1 {
                    return Err(CoreError::validation(format!(
                        "quantity for {} must be at least 1",
                        line.menu_item_id
                    )));
                }
                let quantity = u32::try_from(line.quantity)
                    .map_err(|_| CoreError::validation(format!("quantity for {} is too large", line.menu_item_id)))?;
                let menu_item = self
                    .menu
                    .lookup(&line.menu_item_id)
                    .ok_or_else(|| CoreError::validation(format!("unknown menu item {}", line.menu_item_id)))?;
                if !menu_item.available {
                    return Err(CoreError::validation(format!("{} is not available", menu_item.name)));
                }
                Ok(Item {
                    menu_item_id: menu_item.id,
                    name: menu_item.name,
                    unit_price: menu_item.unit_price,
                    quantity,
                    notes: line.notes.trim().to_string(),
                })
            })
            .collect()
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, CoreError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| CoreError::not_found("order", id))
    }

    /// Snapshot, most recent first. Live changes flow through the bus.
    pub async fn list_orders(
        &self,
        principal: &Principal,
        filter: &OrderFilter,
        page: CommonRequestParams,
    ) -> Result<Vec<Order>, CoreError> {
        principal.require_staff("list orders")?;
        self.store.list_orders(filter, page).await
    }

    /// Order count and revenue for one UTC day, today by default.
    pub async fn summary(&self, principal: &Principal, date: Option<NaiveDate>) -> Result<OrderSummary, CoreError> {
        principal.require_staff("view the order summary")?;
        let date = date.unwrap_or_else(|| time::helper::get_utc_now().date_naive());
        let from = date.and_time(NaiveTime::MIN).and_utc();
        let (order_count, revenue) = self.store.summarize_orders(from, from + Duration::days(1)).await?;
        Ok(OrderSummary { date, order_count, revenue })
    }

    /// Applies a staff status change; nothing is written when it is refused.
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: OrderId,
        req: PatchOrderStatusRequest,
    ) -> Result<Order, CoreError> {
        principal.require_staff("change order status")?;
        let order = self.get_order(id).await?;
        let next = req.status;
        let refused = |e: CoreError| {
            warn!("order={} {} -> {} refused: {}", id, order.status, next, e);
            e
        };
        if let Some(version) = req.version.filter(|v| *v != order.version) {
            return Err(refused(CoreError::conflict(format!(
                "order {} is at version {}, not {}",
                id, order.version, version
            ))));
        }
        if order.status == next && !next.is_terminal() {
            return Err(refused(CoreError::conflict(format!("order {id} is already {next}"))));
        }
        status::check_order_transition(order.order_type, order.status, next).map_err(refused)?;

        let updated = self
            .store
            .update_order_status(id, (order.status, order.version), next, time::helper::get_utc_now())
            .await
            .map_err(refused)?;
        info!("order={} {} -> {} by {}", id, order.status, updated.status, principal.id);
        self.notifier.publish(DomainEvent::OrderStatusChanged(updated.clone()));
        Ok(updated)
    }

    /// Bills exactly `ids` under `bill_id`, or none of them.
    pub async fn mark_billed(&self, ids: &[OrderId], bill_id: BillId) -> Result<Vec<Order>, CoreError> {
        if ids.is_empty() {
            return Err(CoreError::validation("no orders to bill"));
        }
        let billed = self
            .store
            .mark_billed(ids, bill_id, time::helper::get_utc_now())
            .await?;
        for order in &billed {
            info!("order={} billed on bill={}", order.id, bill_id);
            self.notifier.publish(DomainEvent::OrderStatusChanged(order.clone()));
        }
        Ok(billed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::database::memory::MemoryStore;
    use crate::server::service::testing::{customer, dine_in, fixture, line, staff};

    #[tokio::test]
    async fn prices_from_the_menu_and_starts_pending() {
        let (orders, events) = fixture();
        let order = orders
            .create_order(&customer(), dine_in("T1", vec![line("burger", 2)]))
            .await
            .unwrap();

        assert_eq!(order.subtotal, Decimal::from(400));
        assert_eq!(order.tax, Decimal::from(20));
        assert_eq!(order.total, Decimal::from(420));
        assert_eq!(order.items[0].name, "Burger");
        assert_eq!((order.status, order.payment_status), (OrderStatus::Pending, PaymentStatus::Unpaid));
        assert_eq!(order.bill_id, None);
        assert_eq!(orders.get_order(order.id).await.unwrap(), order);
        assert_eq!(events.names(), vec!["order.created"]);
    }

    #[tokio::test]
    async fn summary_covers_the_day_and_skips_cancelled_revenue() {
        let (orders, _) = fixture();
        let kept = orders
            .create_order(&customer(), dine_in("T3", vec![line("burger", 2)]))
            .await
            .unwrap();
        let dropped = orders
            .create_order(&customer(), dine_in("T3", vec![line("garlic-naan", 1)]))
            .await
            .unwrap();
        let cancel = PatchOrderStatusRequest { status: OrderStatus::Cancelled, version: None };
        orders.update_status(&staff(), dropped.id, cancel).await.unwrap();

        let day = kept.created_at.date_naive();
        let summary = orders.summary(&staff(), Some(day)).await.unwrap();
        assert_eq!(summary, OrderSummary { date: day, order_count: 2, revenue: Decimal::from(420) });

        let day_before = day.pred_opt().unwrap();
        let quiet = orders.summary(&staff(), Some(day_before)).await.unwrap();
        assert_eq!((quiet.order_count, quiet.revenue), (0, Decimal::ZERO));

        let refused = orders.summary(&customer(), None).await;
        assert!(matches!(refused, Err(CoreError::Forbidden { .. })));
    }

    #[test]
    fn tax_rounds_half_away_from_zero() {
        let item = Item {
            menu_item_id: "chai".to_string(),
            name: "Chai".to_string(),
            unit_price: Decimal::new(1010, 2),
            quantity: 1,
            notes: String::new(),
        };
        // 10.10 * 0.05 = 0.505
        assert_eq!(price(&[item]), (Decimal::new(1010, 2), Decimal::new(51, 2), Decimal::new(1061, 2)));
    }

    #[tokio::test]
    async fn rejects_malformed_orders_without_storing_them() {
        let (orders, events) = fixture();
        let mut no_address = dine_in("T1", vec![line("burger", 1)]);
        no_address.order_type = OrderType::Delivery;
        let mut no_phone = dine_in("T1", vec![line("burger", 1)]);
        no_phone.customer.phone = " ".to_string();

        let cases = vec![
            ("empty", dine_in("T1", vec![])),
            ("zero quantity", dine_in("T1", vec![line("burger", 0)])),
            ("negative quantity", dine_in("T1", vec![line("burger", -3)])),
            ("unknown item", dine_in("T1", vec![line("pizza", 1)])),
            ("unavailable item", dine_in("T1", vec![line("biryani", 1)])),
            ("no table", dine_in("", vec![line("burger", 1)])),
            ("no address", no_address),
            ("no phone", no_phone),
        ];
        for (name, req) in cases {
            let result = orders.create_order(&customer(), req).await;
            assert!(matches!(result, Err(CoreError::Validation { .. })), "{name}: {result:?}");
        }

        let stored = orders
            .list_orders(&staff(), &OrderFilter::default(), CommonRequestParams::default())
            .await
            .unwrap();
        assert!(stored.is_empty());
        assert!(events.names().is_empty());
    }

    #[tokio::test]
    async fn customers_cannot_list_or_move_orders() {
        let (orders, _) = fixture();
        let order = orders
            .create_order(&customer(), dine_in("T1", vec![line("garlic-naan", 1)]))
            .await
            .unwrap();

        let listed = orders
            .list_orders(&customer(), &OrderFilter::default(), CommonRequestParams::default())
            .await;
        assert!(matches!(listed, Err(CoreError::Forbidden { .. })));

        let req = PatchOrderStatusRequest { status: OrderStatus::Accepted, version: None };
        let moved = orders.update_status(&customer(), order.id, req).await;
        assert!(matches!(moved, Err(CoreError::Forbidden { .. })));
        assert_eq!(orders.get_order(order.id).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn follows_the_lifecycle_and_refuses_illegal_moves() {
        let (orders, events) = fixture();
        let order = orders
            .create_order(&customer(), dine_in("T1", vec![line("burger", 1)]))
            .await
            .unwrap();
        let patch = |status| PatchOrderStatusRequest { status, version: None };

        let skipped = orders.update_status(&staff(), order.id, patch(OrderStatus::Ready)).await;
        assert!(matches!(skipped, Err(CoreError::InvalidTransition { .. })));
        let billed = orders.update_status(&staff(), order.id, patch(OrderStatus::Billed)).await;
        assert!(matches!(billed, Err(CoreError::InvalidTransition { .. })));
        let early_dispatch = orders
            .update_status(&staff(), order.id, patch(OrderStatus::OutForDelivery))
            .await;
        assert!(matches!(early_dispatch, Err(CoreError::InvalidTransition { .. })));
        let unchanged = orders.get_order(order.id).await.unwrap();
        assert_eq!((unchanged.status, unchanged.version), (OrderStatus::Pending, 0));

        for next in [OrderStatus::Accepted, OrderStatus::Preparing, OrderStatus::Ready] {
            let updated = orders.update_status(&staff(), order.id, patch(next)).await.unwrap();
            assert_eq!(updated.status, next);
        }
        let wrong_type = orders
            .update_status(&staff(), order.id, patch(OrderStatus::OutForDelivery))
            .await;
        assert!(matches!(wrong_type, Err(CoreError::Validation { .. })));
        orders.update_status(&staff(), order.id, patch(OrderStatus::Served)).await.unwrap();
        let served = orders.get_order(order.id).await.unwrap();
        assert_eq!(served.version, 4);
        assert!(served.updated_at.is_some());
        assert_eq!(
            events.names(),
            vec!["order.created", "order.status_changed", "order.status_changed", "order.status_changed", "order.status_changed"]
        );

        let again = orders.update_status(&staff(), order.id, patch(OrderStatus::Served)).await;
        assert!(matches!(again, Err(CoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn cancelled_is_final() {
        let (orders, _) = fixture();
        let order = orders
            .create_order(&customer(), dine_in("T2", vec![line("burger", 1)]))
            .await
            .unwrap();
        let patch = |status| PatchOrderStatusRequest { status, version: None };
        orders
            .update_status(&staff(), order.id, patch(OrderStatus::Cancelled))
            .await
            .unwrap();

        for next in [OrderStatus::Cancelled, OrderStatus::Pending, OrderStatus::Accepted] {
            let result = orders.update_status(&staff(), order.id, patch(next)).await;
            assert!(matches!(result, Err(CoreError::InvalidTransition { .. })), "{next}");
        }
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict() {
        let (orders, _) = fixture();
        let order = orders
            .create_order(&customer(), dine_in("T3", vec![line("burger", 1)]))
            .await
            .unwrap();
        let req = PatchOrderStatusRequest { status: OrderStatus::Accepted, version: Some(7) };
        let result = orders.update_status(&staff(), order.id, req).await;
        assert!(matches!(result, Err(CoreError::Conflict { .. })));

        let req = PatchOrderStatusRequest { status: OrderStatus::Accepted, version: Some(0) };
        assert_eq!(orders.update_status(&staff(), order.id, req).await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let (orders, _) = fixture();
        let req = PatchOrderStatusRequest { status: OrderStatus::Accepted, version: None };
        let result = orders.update_status(&staff(), Uuid::new_v4(), req).await;
        assert!(matches!(result, Err(CoreError::NotFound { entity: "order", .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_identical_moves_apply_once() {
        let (orders, _) = fixture();
        let order = orders
            .create_order(&customer(), dine_in("T4", vec![line("burger", 1)]))
            .await
            .unwrap();
        let req = || PatchOrderStatusRequest { status: OrderStatus::Accepted, version: None };
        orders.update_status(&staff(), order.id, req()).await.unwrap();

        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let orders = orders.clone();
                tokio::spawn(async move {
                    let req = PatchOrderStatusRequest { status: OrderStatus::Preparing, version: None };
                    orders.update_status(&staff(), order.id, req).await
                })
            })
            .collect();
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results.iter().filter(|r| matches!(r, Err(CoreError::Conflict { .. }))).count(),
            1
        );
        let stored = orders.get_order(order.id).await.unwrap();
        assert_eq!((stored.status, stored.version), (OrderStatus::Preparing, 2));
    }

    #[tokio::test]
    async fn mark_billed_needs_ids() {
        let orders = OrderService::new(
            MemoryStore::new(),
            Arc::new(crate::server::service::menu::fixtures::catalog()),
            Arc::new(crate::server::bus::testing::RecordingNotifier::default()),
        );
        let result = orders.mark_billed(&[], Uuid::new_v4()).await;
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }
}
