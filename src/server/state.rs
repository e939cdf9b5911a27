use std::sync::Arc;

use crate::server::bus::NotificationBus;
use crate::server::database::StoreBackend;
use crate::server::service::billing::BillAggregator;
use crate::server::service::bookings::BookingService;
use crate::server::service::menu::MenuCatalog;
use crate::server::service::orders::OrderService;

#[derive(Clone)]
pub(crate) struct AppState {
    orders: OrderService<StoreBackend>,
    bills: BillAggregator<StoreBackend>,
    bookings: BookingService<StoreBackend>,
    menu: Arc<dyn MenuCatalog>,
    bus: NotificationBus,
}

impl AppState {
    pub fn new(store: StoreBackend, menu: Arc<dyn MenuCatalog>, bus: NotificationBus) -> Self {
        let notifier = Arc::new(bus.clone());
        let orders = OrderService::new(store.clone(), menu.clone(), notifier.clone());
        Self {
            bills: BillAggregator::new(orders.clone(), notifier.clone()),
            bookings: BookingService::new(store, notifier),
            orders,
            menu,
            bus,
        }
    }

    pub fn orders(&self) -> &OrderService<StoreBackend> {
        &self.orders
    }

    pub fn bills(&self) -> &BillAggregator<StoreBackend> {
        &self.bills
    }

    pub fn bookings(&self) -> &BookingService<StoreBackend> {
        &self.bookings
    }

    pub fn menu(&self) -> &dyn MenuCatalog {
        self.menu.as_ref()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::server::model::event::Room;
    use crate::server::model::principal::{Principal, Role};
    use crate::server::service::testing::{dine_in, line};

    #[actix_web::test]
    async fn services_share_store_and_bus() {
        let state = testing::app_state();
        let mut admin = state.bus().subscribe(Room::Admin);
        let order = state
            .orders()
            .create_order(&Principal::new("guest", Role::Customer), dine_in("T1", vec![line("burger", 1)]))
            .await
            .unwrap();

        assert_eq!(admin.next().await.unwrap().event.name(), "order.created");
        let staff = Principal::new("w1", Role::Staff);
        let candidates = state.bills().candidates(&staff).await.unwrap();
        assert!(candidates.is_empty(), "pending orders are not billable");
        assert_eq!(state.orders().get_order(order.id).await.unwrap().id, order.id);
        assert!(state.menu().lookup("burger").is_some());
    }
}
