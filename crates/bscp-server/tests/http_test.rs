mod common;

use actix_web::{App, http::StatusCode, test, web};

use bscp_server::startup::routes;

use common::TestServer;

#[actix_web::test]
async fn test_healthz_reports_every_shard() {
    let server = TestServer::new().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(server.app_state.clone()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/healthz").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["healthy"], true);
    assert_eq!(body["sessions"], 0);
    assert_eq!(body["shards"].as_array().unwrap().len(), 2);
    assert_eq!(body["shards"][1]["index"], 1);
}

#[actix_web::test]
async fn test_metrics_without_recorder() {
    let server = TestServer::new().await;
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(server.app_state.clone()))
            .configure(routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
