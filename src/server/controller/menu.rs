use actix_web::{get, web, Responder};

use crate::server::model::item::GetMenuResponse;
use crate::server::state::AppState;

#[get("/v1/menu")]
/// read-only view of the catalog orders are priced against
async fn get_menu(data: web::Data<AppState>) -> impl Responder {
    web::Json(GetMenuResponse { items: data.menu().list() })
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use serde_json::Value;

    use crate::server::controller::configure;
    use crate::server::state::testing::app_state;

    use super::*;

    #[actix_web::test]
    async fn lists_the_catalog_without_a_principal() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state()))
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get().uri("/v1/menu").to_request();
        let menu: Value = test::call_and_read_body_json(&app, req).await;
        let items = menu["items"].as_array().unwrap();
        assert_eq!(items.len(), 6);
        let naan = items.iter().find(|i| i["id"] == "garlic-naan").unwrap();
        assert_eq!(naan["unitPrice"], serde_json::json!(90.0));
    }
}
