//! Business rules over the store: ordering, billing and bookings.

pub(crate) mod billing;
pub(crate) mod bookings;
pub(crate) mod menu;
pub(crate) mod orders;
pub(crate) mod status;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::server::bus::testing::RecordingNotifier;
    use crate::server::database::memory::MemoryStore;
    use crate::server::database::Store;
    use crate::server::model::item::ItemInput;
    use crate::server::model::order::{Customer, Order, OrderStatus, OrderType, PatchOrderStatusRequest, PostOrderRequest};
    use crate::server::model::principal::{Principal, Role};
    use crate::server::service::menu::fixtures;
    use crate::server::service::orders::OrderService;

    pub fn staff() -> Principal {
        Principal::new("waiter-1", Role::Staff)
    }

    pub fn customer() -> Principal {
        Principal::new("guest", Role::Customer)
    }

    pub fn line(menu_item_id: &str, quantity: i64) -> ItemInput {
        ItemInput {
            menu_item_id: menu_item_id.to_string(),
            quantity,
            notes: String::new(),
        }
    }

    pub fn dine_in(table_id: &str, items: Vec<ItemInput>) -> PostOrderRequest {
        PostOrderRequest {
            order_type: OrderType::Table,
            table_id: Some(table_id.to_string()),
            customer: Customer {
                name: "Asha".to_string(),
                phone: "98450 12345".to_string(),
                address: None,
            },
            items,
            payment_method: None,
        }
    }

    pub fn delivery(name: &str, items: Vec<ItemInput>) -> PostOrderRequest {
        PostOrderRequest {
            order_type: OrderType::Delivery,
            table_id: None,
            customer: Customer {
                name: name.to_string(),
                phone: "98450 67890".to_string(),
                address: Some("12 MG Road".to_string()),
            },
            items,
            payment_method: None,
        }
    }

    pub fn fixture() -> (OrderService<MemoryStore>, Arc<RecordingNotifier>) {
        let events = Arc::new(RecordingNotifier::default());
        let orders = OrderService::new(MemoryStore::new(), Arc::new(fixtures::catalog()), events.clone());
        (orders, events)
    }

    /// Creates an order and walks it to `ready`.
    pub async fn ready_order<S: Store>(orders: &OrderService<S>, req: PostOrderRequest) -> Order {
        let order = orders.create_order(&customer(), req).await.unwrap();
        advance(orders, order, &[OrderStatus::Accepted, OrderStatus::Preparing, OrderStatus::Ready]).await
    }

    /// Applies each status in turn as staff.
    pub async fn advance<S: Store>(orders: &OrderService<S>, mut order: Order, steps: &[OrderStatus]) -> Order {
        for &status in steps {
            order = orders
                .update_status(&staff(), order.id, PatchOrderStatusRequest { status, version: None })
                .await
                .unwrap();
        }
        order
    }
}
