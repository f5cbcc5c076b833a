//! HTTP request handlers.
//!
//! Handlers only translate between HTTP and the
//! [`LifecycleOrchestrator`]; every decision about processes and
//! persisted state is made there.

use crate::error::Result;
use crate::http::actix_error::ApiError;
use crate::http::types::{CommandRequest, EventsQuery, MessageResponse};
use crate::registry::{NewServer, PropertyValue};
use crate::server::LifecycleOrchestrator;

use actix_web::{
    HttpResponse, Responder,
    web::{Bytes, Data, Json, Path, Query},
};
use std::collections::BTreeMap;

/// `GET /servers`
pub async fn list_servers(orchestrator: Data<LifecycleOrchestrator>) -> Result<HttpResponse> {
    let servers = orchestrator.list_servers().await?;
    Ok(HttpResponse::Ok().json(servers))
}

/// `POST /servers`
///
/// Registers a server whose directory the installer has already populated.
pub async fn create_server(
    orchestrator: Data<LifecycleOrchestrator>,
    body: Json<NewServer>,
) -> Result<HttpResponse> {
    let record = orchestrator.create_server(body.into_inner())?;
    Ok(HttpResponse::Created().json(record))
}

/// `GET /servers/{id}`
pub async fn get_server(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
) -> Result<HttpResponse> {
    let record = orchestrator.get_server(&path).await?;
    Ok(HttpResponse::Ok().json(record))
}

/// `GET /servers/{id}/properties`
pub async fn get_properties(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
) -> Result<HttpResponse> {
    let properties = orchestrator.get_properties(&path).await?;
    Ok(HttpResponse::Ok().json(properties))
}

/// `PUT /servers/{id}/properties`
pub async fn update_properties(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
    body: Json<BTreeMap<String, PropertyValue>>,
) -> Result<HttpResponse> {
    orchestrator.update_properties(&path, &body).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Properties updated. Restart server to apply.",
    )))
}

/// `POST /servers/{id}/start`
pub async fn start_server(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
) -> Result<HttpResponse> {
    let info = orchestrator.start(&path).await?;
    Ok(HttpResponse::Ok().json(MessageResponse {
        process: Some(info),
        ..MessageResponse::new("Server started")
    }))
}

/// `POST /servers/{id}/stop`
pub async fn stop_server(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
) -> Result<HttpResponse> {
    let outcome = orchestrator.stop(&path).await?;
    Ok(HttpResponse::Ok().json(MessageResponse {
        outcome: Some(outcome.to_string()),
        ..MessageResponse::new("Server stopped")
    }))
}

/// `POST /servers/{id}/restart`
pub async fn restart_server(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
) -> Result<HttpResponse> {
    let info = orchestrator.restart(&path).await?;
    Ok(HttpResponse::Ok().json(MessageResponse {
        process: Some(info),
        ..MessageResponse::new("Server restarted")
    }))
}

/// `POST /servers/{id}/command`
pub async fn send_command(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
    body: Json<CommandRequest>,
) -> std::result::Result<HttpResponse, ApiError> {
    let command = body.command.trim();
    if command.is_empty() {
        return Err(ApiError::InvalidRequest("command is empty".to_string()));
    }
    if command.contains('\n') {
        return Err(ApiError::InvalidRequest(
            "command must be a single line".to_string(),
        ));
    }

    orchestrator.send_command(&path, command).await?;
    Ok(HttpResponse::Ok().json(MessageResponse::new("Command sent")))
}

/// `GET /servers/{id}/events`
pub async fn server_events(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
    query: Query<EventsQuery>,
) -> Result<HttpResponse> {
    // Unknown ids are reported rather than answered with an empty list.
    orchestrator.get_server(&path).await?;
    let events = orchestrator.server_events(&path, query.limit);
    Ok(HttpResponse::Ok().json(events))
}

/// `GET /servers/{id}/console`
///
/// Streams console lines as Server-Sent Events, one `data:` frame per line,
/// followed by a `close` event when the stream ends. The subscription is
/// detached as soon as the client goes away and actix drops the stream.
pub async fn console(
    orchestrator: Data<LifecycleOrchestrator>,
    path: Path<String>,
) -> impl Responder {
    let server_id = path.into_inner();
    let mut subscription = orchestrator.attach_console(&server_id).await;
    tracing::debug!(
        server_id = %server_id,
        subscriber = %subscription.id(),
        "Console client connected"
    );

    let stream = async_stream::stream! {
        while let Some(line) = subscription.recv().await {
            yield Ok::<_, actix_web::Error>(format_console_line(&line));
        }
        yield Ok::<_, actix_web::Error>(Bytes::from_static(b"event: close\ndata: \n\n"));
        tracing::debug!(server_id = %server_id, "Console stream finished");
    };

    HttpResponse::Ok()
        .append_header(("Content-Type", "text/event-stream"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Connection", "keep-alive"))
        .streaming(stream)
}

/// Format one console line as an SSE frame
pub fn format_console_line(line: &str) -> Bytes {
    let mut frame = String::with_capacity(line.len() + 8);
    // A stray carriage return would split the frame on some clients.
    for part in line.split('\r') {
        frame.push_str("data: ");
        frame.push_str(part);
        frame.push('\n');
    }
    frame.push('\n');
    Bytes::from(frame)
}
