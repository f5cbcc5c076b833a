//! HTTP front end built on Actix Web.
//!
//! Exposes the lifecycle operations as a small JSON API and streams server
//! consoles as Server-Sent Events:
//!
//! | Route | Operation |
//! |---|---|
//! | `GET /servers` | list servers with live status |
//! | `POST /servers` | register an installed server |
//! | `GET /servers/{id}` | one server with live status |
//! | `GET`/`PUT /servers/{id}/properties` | read / merge `server.properties` |
//! | `POST /servers/{id}/start`, `/stop`, `/restart` | lifecycle |
//! | `POST /servers/{id}/command` | write a console command |
//! | `GET /servers/{id}/events` | recent lifecycle events |
//! | `GET /servers/{id}/console` | live console stream |
//!
//! # Examples
//!
//! ```no_run
//! use craft_runner::config::HttpConfig;
//! use craft_runner::http::HttpServerHandle;
//! # use craft_runner::server::LifecycleOrchestrator;
//! # use std::sync::Arc;
//!
//! # async fn example(orchestrator: Arc<LifecycleOrchestrator>) -> craft_runner::Result<()> {
//! let handle = HttpServerHandle::start(orchestrator, &HttpConfig::default())?;
//! // ...
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```
pub mod actix_error;
pub mod handlers;
pub mod types;

use crate::config::{DEFAULT_WORKERS, HttpConfig};
use crate::error::{Error, Result};
use crate::server::LifecycleOrchestrator;

use actix_cors::Cors;
use actix_web::{
    App, HttpServer, middleware,
    web::{self, Data},
};
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Registers every route on an Actix service config.
///
/// The app must carry a `Data<LifecycleOrchestrator>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/servers")
            .route("", web::get().to(handlers::list_servers))
            .route("", web::post().to(handlers::create_server))
            .route("/{id}", web::get().to(handlers::get_server))
            .route("/{id}/properties", web::get().to(handlers::get_properties))
            .route("/{id}/properties", web::put().to(handlers::update_properties))
            .route("/{id}/start", web::post().to(handlers::start_server))
            .route("/{id}/stop", web::post().to(handlers::stop_server))
            .route("/{id}/restart", web::post().to(handlers::restart_server))
            .route("/{id}/command", web::post().to(handlers::send_command))
            .route("/{id}/events", web::get().to(handlers::server_events))
            .route("/{id}/console", web::get().to(handlers::console)),
    );
}

/// Handle for a running HTTP server
pub struct HttpServerHandle {
    /// Actix server control handle
    server: actix_web::dev::ServerHandle,
    /// Addresses the server is bound to
    addrs: Vec<SocketAddr>,
    /// Task driving the server
    task: JoinHandle<()>,
}

impl HttpServerHandle {
    /// Binds and starts the HTTP server in a background task.
    ///
    /// Signal handling is left to the caller, which is expected to stop the
    /// servers after [`shutdown`](Self::shutdown).
    #[tracing::instrument(
        skip(orchestrator, config),
        fields(address = %config.address, port = config.port)
    )]
    pub fn start(orchestrator: Arc<LifecycleOrchestrator>, config: &HttpConfig) -> Result<Self> {
        let addr_str = format!("{}:{}", config.address, config.port);
        let addr = addr_str
            .to_socket_addrs()
            .map_err(|e| Error::Other(format!("Failed to parse socket address: {}", e)))?
            .next()
            .ok_or_else(|| {
                Error::Other(format!("Could not parse socket address: {}", addr_str))
            })?;

        let data = Data::from(orchestrator);
        let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
        tracing::info!(workers = workers, "Setting number of Actix Web workers");

        let server = HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(middleware::Logger::default())
                .wrap(cors)
                .app_data(data.clone())
                .configure(configure)
        })
        .workers(workers)
        .shutdown_timeout(config.shutdown_timeout_secs)
        .disable_signals()
        .bind(addr)
        .map_err(|e| Error::Other(format!("Failed to bind server: {}", e)))?;

        let addrs = server.addrs();
        let server = server.run();

        let handle = server.handle();
        let task = tokio::spawn(async move {
            if let Err(e) = server.await {
                tracing::error!(error = %e, "HTTP server error");
            }
        });

        tracing::info!(addresses = ?addrs, "HTTP server started");
        Ok(Self {
            server: handle,
            addrs,
            task,
        })
    }

    /// Addresses the server is bound to. Useful when the configured port is 0.
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Stops accepting connections and waits for the server task to end.
    ///
    /// Open connections get the configured shutdown timeout to finish.
    pub async fn shutdown(self) {
        self.server.stop(true).await;
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Error while joining HTTP server task");
        }
    }
}
