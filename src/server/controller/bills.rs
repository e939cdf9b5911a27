use actix_web::{get, patch, post, web, HttpResponse, Responder};
use uuid::Uuid;

use crate::server::controller::error::CoreError;
use crate::server::model::bill::{
    BillFilter, BillMeta, GetBillGroupsResponse, GetBillsResponse, PatchBillPaidRequest, PostBillsRequest,
};
use crate::server::model::principal::Principal;
use crate::server::model::CommonRequestParams;
use crate::server::state::AppState;

#[post("/v1/bills")]
async fn post_bills(
    principal: Principal,
    req: web::Json<PostBillsRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let PostBillsRequest { order_ids, notes } = req.into_inner();
    let meta = BillMeta {
        notes,
        created_by: Some(principal.id.clone()),
    };
    let bill = data.bills().create_bill(&principal, order_ids, meta).await?;
    Ok(HttpResponse::Created().json(bill))
}

#[get("/v1/bills")]
async fn get_bills(
    principal: Principal,
    filter: web::Query<BillFilter>,
    page: web::Query<CommonRequestParams>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let bills = data
        .bills()
        .list_bills(&principal, filter.into_inner(), page.into_inner())
        .await?;
    Ok(web::Json(GetBillsResponse { count: bills.len(), bills }))
}

#[get("/v1/bills/candidates")]
/// unbilled orders grouped by table or customer
async fn get_bill_candidates(principal: Principal, data: web::Data<AppState>) -> Result<impl Responder, CoreError> {
    let groups = data.bills().candidates(&principal).await?;
    Ok(web::Json(GetBillGroupsResponse { groups }))
}

#[get("/v1/bill/{id}")]
async fn get_bill(principal: Principal, id: web::Path<Uuid>, data: web::Data<AppState>) -> Result<impl Responder, CoreError> {
    Ok(web::Json(data.bills().get_bill(&principal, id.into_inner()).await?))
}

#[patch("/v1/bill/{id}/paid")]
async fn patch_bill_paid(
    principal: Principal,
    id: web::Path<Uuid>,
    req: web::Json<PatchBillPaidRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CoreError> {
    let bill = data
        .bills()
        .mark_paid(&principal, id.into_inner(), &req.payment_ref)
        .await?;
    Ok(web::Json(bill))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};

    use crate::server::controller::configure;
    use crate::server::model::principal::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER};
    use crate::server::service::testing::{dine_in, line, ready_order};
    use crate::server::state::testing::app_state;

    use super::*;

    #[actix_web::test]
    async fn bill_and_settle_over_http() {
        let state = app_state();
        let a = ready_order(state.orders(), dine_in("T4", vec![line("burger", 2)])).await;
        let b = ready_order(state.orders(), dine_in("T4", vec![line("garlic-naan", 1)])).await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/v1/bills/candidates")
            .insert_header((PRINCIPAL_ROLE_HEADER, "staff"))
            .to_request();
        let candidates: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(candidates["groups"][0]["label"], "Table T4");
        assert_eq!(candidates["groups"][0]["orders"].as_array().map(Vec::len), Some(2));

        let req = test::TestRequest::post()
            .uri("/v1/bills")
            .insert_header((PRINCIPAL_ROLE_HEADER, "staff"))
            .insert_header((PRINCIPAL_ID_HEADER, "cashier-2"))
            .set_json(json!({"orderIds": [a.id, b.id], "notes": "split later"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let bill: Value = test::read_body_json(resp).await;
        assert_eq!(bill["status"], "unpaid");
        assert_eq!(bill["createdBy"], "cashier-2");
        assert_eq!(bill["total"], json!(514.5));
        let id = bill["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri("/v1/bills")
            .insert_header((PRINCIPAL_ROLE_HEADER, "staff"))
            .set_json(json!({"orderIds": [b.id]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let refusal: Value = test::read_body_json(resp).await;
        assert_eq!(refusal["result_code"], "E_CONFLICT");
        assert!(refusal["message"].as_str().unwrap().contains("already billed"));

        let pay = |reference: &str| {
            test::TestRequest::patch()
                .uri(&format!("/v1/bill/{id}/paid"))
                .insert_header((PRINCIPAL_ROLE_HEADER, "staff"))
                .set_json(json!({"paymentRef": reference}))
                .to_request()
        };
        let paid: Value = test::call_and_read_body_json(&app, pay("UPI-77")).await;
        assert_eq!((paid["status"].as_str(), paid["paymentRef"].as_str()), (Some("paid"), Some("UPI-77")));
        let resp = test::call_service(&app, pay("UPI-78")).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let refusal: Value = test::read_body_json(resp).await;
        assert_eq!(refusal["result_code"], "E_INVALID_TRANSITION");

        let req = test::TestRequest::get()
            .uri("/v1/bills?status=paid")
            .insert_header((PRINCIPAL_ROLE_HEADER, "admin"))
            .to_request();
        let listed: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["bills"][0]["id"], id.as_str());
    }

    #[actix_web::test]
    async fn customers_cannot_bill() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bills")
            .insert_header((PRINCIPAL_ROLE_HEADER, "customer"))
            .set_json(json!({"orderIds": [Uuid::new_v4()]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri(&format!("/v1/bill/{}", Uuid::new_v4()))
            .insert_header((PRINCIPAL_ROLE_HEADER, "staff"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
