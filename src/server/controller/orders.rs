use actix_web::{get, patch, post, web, HttpResponse, Responder};
use uuid::Uuid;

use crate::server::controller::error::CoreError;
use crate::server::model::order::{
    GetOrdersResponse, OrderFilter, OrderSummaryQuery, PatchOrderStatusRequest, PostOrderRequest,
};
use crate::server::model::principal::Principal;
use crate::server::model::CommonRequestParams;
use crate::server::state::AppState;

#[post("/v1/orders")]
/// place an order, any role
async fn post_orders(
    principal: Principal,
    req: web::Json<PostOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let order = data.orders().create_order(&principal, req.into_inner()).await?;
    Ok(HttpResponse::Created().json(order))
}

#[get("/v1/orders")]
async fn get_orders(
    principal: Principal,
    filter: web::Query<OrderFilter>,
    page: web::Query<CommonRequestParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let orders = data
        .orders()
        .list_orders(&principal, &filter, page.into_inner())
        .await?;
    Ok(web::Json(GetOrdersResponse { count: orders.len(), orders }))
}

#[get("/v1/orders/summary")]
/// dashboard figures, `?date=YYYY-MM-DD` for a past day
async fn get_orders_summary(
    principal: Principal,
    query: web::Query<OrderSummaryQuery>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    Ok(web::Json(data.orders().summary(&principal, query.into_inner().date).await?))
}

#[get("/v1/order/{id}")]
/// order tracking, any role
async fn get_order(_: Principal, id: web::Path<Uuid>, data: web::Data<AppState>) -> Result<impl Responder, CoreError> {
    Ok(web::Json(data.orders().get_order(id.into_inner()).await?))
}

#[patch("/v1/order/{id}/status")]
async fn patch_order_status(
    principal: Principal,
    id: web::Path<Uuid>,
    req: web::Json<PatchOrderStatusRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let order = data
        .orders()
        .update_status(&principal, id.into_inner(), req.into_inner())
        .await?;
    Ok(web::Json(order))
}
