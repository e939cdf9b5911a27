//! Server-sent event streams over notification bus rooms.

use std::convert::Infallible;
use std::time::Duration;

use actix_web::web::Bytes;
use actix_web::{get, web, HttpResponse};
use futures_util::stream;
use log::{error, info};
use tokio::select;

use crate::server::bus::NotificationBus;
use crate::server::controller::error::CoreError;
use crate::server::model::event::{Notification, Room};
use crate::server::model::principal::Principal;
use crate::server::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const KEEP_ALIVE_FRAME: &[u8] = b": keep-alive\n\n";

#[get("/v1/events/admin")]
/// staff dashboard feed
async fn get_admin_events(principal: Principal, data: web::Data<AppState>) -> Result<HttpResponse, CoreError> {
    principal.require_staff("follow the admin room")?;
    Ok(event_stream(data.bus(), Room::Admin, &principal))
}

#[get("/v1/events/session/{key}")]
/// customer tracker feed for a table id or a delivery order id
async fn get_session_events(
    principal: Principal,
    key: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, CoreError> {
    let key = key.into_inner();
    if key.trim().is_empty() {
        return Err(CoreError::validation("session key is required"));
    }
    Ok(event_stream(data.bus(), Room::Session(key), &principal))
}

/// The subscription lives as long as the response body; a client hang-up
/// drops both and leaves the room.
fn event_stream(bus: &NotificationBus, room: Room, principal: &Principal) -> HttpResponse {
    let subscription = bus.subscribe(room);
    info!(
        "{} joined room={}, {} listening",
        principal.id,
        subscription.room(),
        bus.subscriber_count(subscription.room())
    );
    let frames = stream::unfold(subscription, |mut subscription| async move {
        let frame = select! {
            notification = subscription.next() => {
                let notification = notification?;
                encode(&notification)
            }
            _ = tokio::time::sleep(KEEP_ALIVE_INTERVAL) => Bytes::from_static(KEEP_ALIVE_FRAME),
        };
        Some((Ok::<_, Infallible>(frame), subscription))
    });
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("cache-control", "no-cache"))
        .streaming(frames)
}

fn encode(notification: &Notification) -> Bytes {
    match serde_json::to_string(notification) {
        Ok(json) => Bytes::from(format!("event: {}\ndata: {}\n\n", notification.event.name(), json)),
        Err(e) => {
            error!("failed to encode {} for room={}, {}", notification.event.name(), notification.room, e);
            Bytes::from_static(KEEP_ALIVE_FRAME)
        }
    }
}
