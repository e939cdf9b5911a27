use actix_web::{get, patch, post, web, HttpResponse, Responder};
use uuid::Uuid;

use crate::server::controller::error::CoreError;
use crate::server::model::booking::{BookingFilter, GetBookingsResponse, PatchBookingStatusRequest, PostBookingRequest};
use crate::server::model::principal::Principal;
use crate::server::model::CommonRequestParams;
use crate::server::state::AppState;

#[post("/v1/bookings")]
async fn post_bookings(
    principal: Principal,
    req: web::Json<PostBookingRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let booking = data.bookings().create_booking(&principal, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(booking))
}

#[get("/v1/bookings")]
async fn get_bookings(
    principal: Principal,
    filter: web::Query<BookingFilter>,
    page: web::Query<CommonRequestParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let bookings = data
        .bookings()
        .list_bookings(&principal, filter.into_inner(), page.into_inner())
        .await?;
    Ok(web::Json(GetBookingsResponse { count: bookings.len(), bookings }))
}

#[get("/v1/booking/{id}")]
async fn get_booking(
    principal: Principal,
    id: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    Ok(web::Json(data.bookings().get_booking(&principal, id.into_inner()).await?))
}

#[patch("/v1/booking/{id}/status")]
async fn patch_booking_status(
    principal: Principal,
    id: web::Path<Uuid>,
    req: web::Json<PatchBookingStatusRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let booking = data
        .bookings()
        .update_status(&principal, id.into_inner(), req.into_inner())
        .await?;
    Ok(web::Json(booking))
}
