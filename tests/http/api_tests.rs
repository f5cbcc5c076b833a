use crate::common::{ECHO_SCRIPT, Fixture, IDLE_SCRIPT};
use actix_web::{App, test, web::Data};
use craft_runner::http::configure;
use craft_runner::server::LifecycleOrchestrator;
use serde_json::{Value, json};
use std::sync::Arc;

macro_rules! init_app {
    ($data:expr) => {
        test::init_service(App::new().app_data($data.clone()).configure(configure)).await
    };
}

fn app_data(fixture: &Fixture) -> Data<LifecycleOrchestrator> {
    Data::from(Arc::clone(&fixture.orchestrator))
}

#[actix_web::test]
async fn test_create_and_list_servers() {
    let fixture = Fixture::new();
    let data = app_data(&fixture);
    let app = init_app!(data);

    let req = test::TestRequest::get().uri("/servers").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!([]));

    let req = test::TestRequest::post()
        .uri("/servers")
        .set_json(json!({ "name": "Survival", "type": "bedrock", "version": "1.21.0", "ram": 2 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Value = test::read_body_json(resp).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "stopped");
    assert_eq!(created["type"], "bedrock");

    let req = test::TestRequest::get().uri("/servers").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["name"], "Survival");

    let req = test::TestRequest::get()
        .uri(&format!("/servers/{}", id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["ram"], 2);
}

#[actix_web::test]
async fn test_unknown_server_is_not_found() {
    let fixture = Fixture::new();
    let data = app_data(&fixture);
    let app = init_app!(data);

    for (method, path) in [
        ("GET", "/servers/ghost"),
        ("GET", "/servers/ghost/properties"),
        ("GET", "/servers/ghost/events"),
        ("POST", "/servers/ghost/start"),
        ("POST", "/servers/ghost/stop"),
        ("POST", "/servers/ghost/restart"),
    ] {
        let req = match method {
            "GET" => test::TestRequest::get(),
            _ => test::TestRequest::post(),
        }
        .uri(path)
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404, "{} {}", method, path);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 404);
        assert!(body["error"].as_str().unwrap().contains("ghost"));
    }
}

#[actix_web::test]
async fn test_lifecycle_over_http() {
    let fixture = Fixture::new();
    let data = app_data(&fixture);
    let record = fixture.install("Echo", ECHO_SCRIPT);
    let app = init_app!(data);
    let base = format!("/servers/{}", record.id);

    let req = test::TestRequest::post().uri(&format!("{}/start", base)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Server started");
    assert!(body["process"]["pid"].as_u64().unwrap() > 0);

    let req = test::TestRequest::post().uri(&format!("{}/start", base)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let req = test::TestRequest::get().uri(&base).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "running");

    let req = test::TestRequest::post()
        .uri(&format!("{}/command", base))
        .set_json(json!({ "command": "say hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::post()
        .uri(&format!("{}/command", base))
        .set_json(json!({ "command": "   " }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post().uri(&format!("{}/stop", base)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Server stopped");
    assert_eq!(body["outcome"], "graceful");

    let req = test::TestRequest::post().uri(&format!("{}/stop", base)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let req = test::TestRequest::post()
        .uri(&format!("{}/command", base))
        .set_json(json!({ "command": "say hi" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);

    let req = test::TestRequest::get()
        .uri(&format!("{}/events?limit=10", base))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let events: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();
    assert_eq!(events, vec!["stopped", "started"]);
    assert_eq!(body[0]["serverId"], record.id.as_str());
}

#[actix_web::test]
async fn test_restart_over_http() {
    let fixture = Fixture::new();
    let data = app_data(&fixture);
    let record = fixture.install("Idle", IDLE_SCRIPT);
    let app = init_app!(data);
    let base = format!("/servers/{}", record.id);

    let req = test::TestRequest::post().uri(&format!("{}/restart", base)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Server restarted");

    let req = test::TestRequest::post().uri(&format!("{}/stop", base)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_missing_artifact_is_unprocessable() {
    let fixture = Fixture::new();
    let data = app_data(&fixture);
    let record = fixture
        .registry
        .create(crate::common::new_server("Bare", craft_runner::ServerKind::Java))
        .unwrap();
    let app = init_app!(data);

    let req = test::TestRequest::post()
        .uri(&format!("/servers/{}/start", record.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);
}

#[actix_web::test]
async fn test_properties_over_http() {
    let fixture = Fixture::new();
    let data = app_data(&fixture);
    let record = fixture.install("Idle", IDLE_SCRIPT);
    let app = init_app!(data);
    let uri = format!("/servers/{}/properties", record.id);

    let req = test::TestRequest::put()
        .uri(&uri)
        .set_json(json!({ "max_players": 5, "motd": "Hello" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Properties updated. Restart server to apply.");

    let req = test::TestRequest::put()
        .uri(&uri)
        .set_json(json!({ "pvp": false }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri(&uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({ "max_players": "5", "motd": "Hello", "pvp": "false" })
    );
}

#[actix_web::test]
async fn test_invalid_property_key_is_bad_request() {
    let fixture = Fixture::new();
    let data = app_data(&fixture);
    let record = fixture.install("Idle", IDLE_SCRIPT);
    let app = init_app!(data);
    let uri = format!("/servers/{}/properties", record.id);

    let req = test::TestRequest::put()
        .uri(&uri)
        .set_json(json!({ "#motd": "v" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);

    let req = test::TestRequest::get().uri(&uri).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({}));
}
