//! HTTP handlers and the error-to-response mapping.

pub(crate) mod bills;
pub(crate) mod bookings;
pub(crate) mod error;
pub(crate) mod events;
pub(crate) mod menu;
pub(crate) mod orders;

use actix_web::web;

use crate::server::controller::error::CoreError;

/// Registers every route. Malformed bodies, queries and paths are reported
/// as `E_VALIDATION` like any other refused input.
pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|e, _| CoreError::validation(e.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|e, _| CoreError::validation(e.to_string()).into()))
        .app_data(web::PathConfig::default().error_handler(|e, _| CoreError::validation(e.to_string()).into()))
        .service(orders::post_orders)
        .service(orders::get_orders)
        .service(orders::get_orders_summary)
        .service(orders::get_order)
        .service(orders::patch_order_status)
        .service(bills::post_bills)
        .service(bills::get_bills)
        .service(bills::get_bill_candidates)
        .service(bills::get_bill)
        .service(bills::patch_bill_paid)
        .service(bookings::post_bookings)
        .service(bookings::get_bookings)
        .service(bookings::get_booking)
        .service(bookings::patch_booking_status)
        .service(events::get_admin_events)
        .service(events::get_session_events)
        .service(menu::get_menu);
}
