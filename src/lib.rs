/*!
 # Craft Runner

 A Rust service for supervising game server processes (Minecraft Java and
 Bedrock) and streaming their consoles to any number of viewers.

 ## Overview

 Craft Runner provides functionality to:
 - Keep a durable catalog of installed servers, one directory per server
 - Start, stop and restart the server processes, with a graceful stop that
   escalates to a kill after a grace period
 - Read and merge `server.properties` files
 - Send console commands to a running server
 - Fan a server's combined stdout/stderr out to live viewers
 - Expose all of the above over HTTP, with consoles as Server-Sent Events

 ## Basic Usage

 ```no_run
 use craft_runner::{Config, LifecycleOrchestrator, ProcessSupervisor, Result, ServerRegistry};
 use std::sync::Arc;

 #[tokio::main]
 async fn main() -> Result<()> {
     let config = Config::from_file("craft-runner.yaml")?;

     // Load every server found under the servers directory
     let registry = Arc::new(ServerRegistry::open(&config.servers_dir)?);
     registry.load()?;

     let supervisor = Arc::new(ProcessSupervisor::new(config.supervisor.clone()));
     let orchestrator = LifecycleOrchestrator::new(registry, supervisor);

     // Start a server and follow its console
     let info = orchestrator.start("4f1c").await?;
     println!("Started pid {}", info.pid);

     let mut console = orchestrator.attach_console("4f1c").await;
     while let Some(line) = console.recv().await {
         if line.contains("Done") {
             break;
         }
     }

     orchestrator.send_command("4f1c", "say hello").await?;
     orchestrator.stop("4f1c").await?;

     Ok(())
 }
 ```

 ## Features

 - **Server Registry**: JSON records and `server.properties` per server directory
 - **Process Supervision**: One live process per server, crash detection on poll
 - **Console Streaming**: Ordered, non-blocking fan-out with a replay backlog
 - **Configuration**: JSON or YAML config files
 - **HTTP API**: Actix Web routes with CORS and SSE consoles

 ## License

 This project is licensed under the terms in the LICENSE file.
*/

pub mod config;
pub mod console;
pub mod error;
pub mod http;
pub mod registry;
pub mod server;

pub use config::Config;
pub use console::{ConsoleBroadcaster, ConsoleSubscription};
pub use error::{Error, Result};
pub use http::HttpServerHandle;
pub use registry::{ServerKind, ServerRecord, ServerRegistry, ServerStatus};
pub use server::{LifecycleOrchestrator, ProcessSupervisor};
