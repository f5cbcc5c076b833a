use crate::common::Fixture;
use actix_web::{App, test, web::Data};
use craft_runner::http::configure;
use std::sync::Arc;

/// Prints two lines a moment apart and exits, which ends the stream.
const SHORT_LIVED_SCRIPT: &str = "#!/bin/sh\necho booting\nsleep 1\necho shutting down\n";

#[actix_web::test]
async fn test_console_of_stopped_server() {
    let fixture = Fixture::new();
    let record = fixture.install("Idle", crate::common::IDLE_SCRIPT);
    let app = test::init_service(
        App::new()
            .app_data(Data::from(Arc::clone(&fixture.orchestrator)))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/servers/{}/console", record.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );

    let body = test::read_body(resp).await;
    assert_eq!(
        &body[..],
        b"data: [craft-runner] Server is not running.\n\nevent: close\ndata: \n\n"
    );
}

#[actix_web::test]
async fn test_console_of_unknown_server() {
    let fixture = Fixture::new();
    let app = test::init_service(
        App::new()
            .app_data(Data::from(Arc::clone(&fixture.orchestrator)))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/servers/ghost/console").to_request();
    let body = test::call_and_read_body(&app, req).await;
    assert!(body.starts_with(b"data: [craft-runner] Server is not running.\n\n"));
}

#[actix_web::test]
async fn test_console_streams_until_exit() {
    let fixture = Fixture::new();
    let record = fixture.install("Short", SHORT_LIVED_SCRIPT);
    let app = test::init_service(
        App::new()
            .app_data(Data::from(Arc::clone(&fixture.orchestrator)))
            .configure(configure),
    )
    .await;

    fixture.orchestrator.start(&record.id).await.unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/servers/{}/console", record.id))
        .to_request();
    let body = test::call_and_read_body(&app, req).await;

    assert_eq!(
        &body[..],
        b"data: booting\n\ndata: shutting down\n\nevent: close\ndata: \n\n"
    );
}
