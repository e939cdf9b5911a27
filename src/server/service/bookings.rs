use std::sync::Arc;

use chrono::NaiveTime;
use log::{info, warn};
use uuid::Uuid;

use crate::server::bus::Notifier;
use crate::server::controller::error::CoreError;
use crate::server::database::Store;
use crate::server::model::booking::{
    Booking, BookingFilter, BookingId, BookingStatus, BookingType, PatchBookingStatusRequest, PostBookingRequest,
};
use crate::server::model::event::DomainEvent;
use crate::server::model::principal::Principal;
use crate::server::model::CommonRequestParams;
use crate::server::service::status;
use crate::server::util::time;

#[derive(Clone)]
pub(crate) struct BookingService<S: Store> {
    store: S,
    notifier: Arc<dyn Notifier>,
}

impl<S: Store> BookingService<S> {
    pub fn new(store: S, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    pub async fn create_booking(&self, principal: &Principal, req: PostBookingRequest) -> Result<Booking, CoreError> {
        let customer_name = req.customer_name.trim();
        let phone = req.phone.trim();
        if customer_name.is_empty() || phone.is_empty() {
            return Err(CoreError::validation("customer name and phone are required"));
        }
        let guests = u32::try_from(req.guests)
            .ok()
            .filter(|g| *g >= 1)
            .ok_or_else(|| CoreError::validation("a booking needs at least one guest"))?;
        let slot = req.time.trim();
        NaiveTime::parse_from_str(slot, "%H:%M")
            .map_err(|_| CoreError::validation(format!("time {slot} is not HH:MM")))?;

        let booking = Booking {
            id: Uuid::new_v4(),
            booking_type: req.booking_type,
            customer_name: customer_name.to_string(),
            phone: phone.to_string(),
            date: req.date,
            time: slot.to_string(),
            guests,
            // details only mean something for events
            event_details: match req.booking_type {
                BookingType::Event => req.event_details,
                BookingType::Table => None,
            },
            status: BookingStatus::Pending,
            version: 0,
            created_at: time::helper::get_utc_now(),
            updated_at: None,
        };
        self.store.insert_booking(&booking).await?;
        info!(
            "booking={} created by {} ({} on {} {}, guests={})",
            booking.id, principal.id, booking.booking_type, booking.date, booking.time, booking.guests
        );
        self.notifier.publish(DomainEvent::BookingCreated(booking.clone()));
        Ok(booking)
    }

    pub async fn get_booking(&self, principal: &Principal, id: BookingId) -> Result<Booking, CoreError> {
        principal.require_staff("view bookings")?;
        self.store
            .get_booking(id)
            .await?
            .ok_or_else(|| CoreError::not_found("booking", id))
    }

    pub async fn list_bookings(
        &self,
        principal: &Principal,
        filter: BookingFilter,
        page: CommonRequestParams,
    ) -> Result<Vec<Booking>, CoreError> {
        principal.require_staff("list bookings")?;
        self.store.list_bookings(filter, page).await
    }

    pub async fn update_status(
        &self,
        principal: &Principal,
        id: BookingId,
        req: PatchBookingStatusRequest,
    ) -> Result<Booking, CoreError> {
        principal.require_staff("change booking status")?;
        let booking = self.get_booking(principal, id).await?;
        let next = req.status;
        let refused = |e: CoreError| {
            warn!("booking={} {} -> {} refused: {}", id, booking.status, next, e);
            e
        };
        if let Some(version) = req.version.filter(|v| *v != booking.version) {
            return Err(refused(CoreError::conflict(format!(
                "booking {} is at version {}, not {}",
                id, booking.version, version
            ))));
        }
        if booking.status == next && !next.is_terminal() {
            return Err(refused(CoreError::conflict(format!("booking {id} is already {next}"))));
        }
        status::check_booking_transition(booking.status, next).map_err(refused)?;

        let updated = self
            .store
            .update_booking_status(id, (booking.status, booking.version), next, time::helper::get_utc_now())
            .await
            .map_err(refused)?;
        info!("booking={} {} -> {} by {}", id, booking.status, updated.status, principal.id);
        self.notifier.publish(DomainEvent::BookingStatusChanged(updated.clone()));
        Ok(updated)
    }
}
