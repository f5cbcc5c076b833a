use crate::console::ConsoleSubscription;
use crate::error::{Error, Result};
use crate::registry::{NewServer, PropertyValue, ServerRecord, ServerRegistry, ServerStatus};
use crate::server::process::{ProcessInfo, StopOutcome};
use crate::server::supervisor::{ProcessSlot, ProcessSupervisor};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

/// Maximum number of lifecycle events kept in memory
const EVENT_HISTORY_LIMIT: usize = 1000;

/// Server lifecycle event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerLifecycleEvent {
    /// Server started
    Started,
    /// Server stopped on request
    Stopped,
    /// Server process was found to have exited without a stop request
    Exited,
    /// Server restarted
    Restarted,
}

/// Server lifecycle event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    /// Server ID
    pub server_id: String,
    /// Event type
    pub event: ServerLifecycleEvent,
    /// Event timestamp
    pub timestamp: SystemTime,
    /// Event details
    pub details: Option<String>,
}

/// Coordinates the registry and the supervisor.
///
/// Every operation takes the supervisor slot of its server id first, then
/// performs the process operation and persists the resulting status before
/// returning. A caller therefore never observes a persisted status that
/// disagrees with the process it just started or stopped.
///
/// # Examples
///
/// ```no_run
/// use craft_runner::config::SupervisorConfig;
/// use craft_runner::registry::ServerRegistry;
/// use craft_runner::server::{LifecycleOrchestrator, ProcessSupervisor};
/// use std::sync::Arc;
///
/// # async fn example() -> craft_runner::Result<()> {
/// let registry = Arc::new(ServerRegistry::open("servers")?);
/// registry.load()?;
/// let supervisor = Arc::new(ProcessSupervisor::new(SupervisorConfig::default()));
/// let orchestrator = LifecycleOrchestrator::new(registry, supervisor);
///
/// for server in orchestrator.list_servers().await? {
///     println!("{} ({}) is {}", server.name, server.id, server.status);
/// }
/// # Ok(())
/// # }
/// ```
pub struct LifecycleOrchestrator {
    /// Durable server catalog
    registry: Arc<ServerRegistry>,
    /// Live process owner
    supervisor: Arc<ProcessSupervisor>,
    /// Recent lifecycle events, oldest first
    events: Mutex<VecDeque<ServerEvent>>,
}

impl LifecycleOrchestrator {
    /// Create a new orchestrator over an injected registry and supervisor
    pub fn new(registry: Arc<ServerRegistry>, supervisor: Arc<ProcessSupervisor>) -> Self {
        Self {
            registry,
            supervisor,
            events: Mutex::new(VecDeque::new()),
        }
    }

    /// The server catalog
    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    /// The process supervisor
    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    /// Registers a freshly installed server.
    pub fn create_server(&self, new: NewServer) -> Result<ServerRecord> {
        self.registry.create(new)
    }

    /// All servers with live status.
    #[tracing::instrument(skip(self))]
    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>> {
        let mut servers = Vec::new();
        for record in self.registry.list()? {
            let mut slot = self.supervisor.lock(&record.id).await;
            servers.push(self.reconcile(&mut slot)?);
        }
        Ok(servers)
    }

    /// One server with live status.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn get_server(&self, id: &str) -> Result<ServerRecord> {
        self.ensure_exists(id)?;
        let mut slot = self.supervisor.lock(id).await;
        self.reconcile(&mut slot)
    }

    /// Live status of one server, persisted if it changed.
    pub async fn status(&self, id: &str) -> Result<ServerStatus> {
        Ok(self.get_server(id).await?.status)
    }

    /// Current `server.properties` with underscored keys.
    pub async fn get_properties(&self, id: &str) -> Result<BTreeMap<String, String>> {
        self.ensure_exists(id)?;
        let _slot = self.supervisor.lock(id).await;
        self.registry.read_properties(id)
    }

    /// Merges overrides into `server.properties`. A running server picks the
    /// change up on its next restart.
    pub async fn update_properties(
        &self,
        id: &str,
        overrides: &BTreeMap<String, PropertyValue>,
    ) -> Result<()> {
        self.ensure_exists(id)?;
        let _slot = self.supervisor.lock(id).await;
        self.registry.write_properties(id, overrides)
    }

    /// Starts a server and persists `running`.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn start(&self, id: &str) -> Result<ProcessInfo> {
        let record = self.registry.get(id)?;
        let mut slot = self.supervisor.lock(id).await;

        let info = slot.start(&record, &self.registry.server_dir(id))?;
        self.persist_started(&mut slot).await?;
        self.record_event(id, ServerLifecycleEvent::Started, Some(format!("pid {}", info.pid)));

        Ok(info)
    }

    /// Stops a server and persists `stopped`.
    ///
    /// `NotRunning` is returned as an error; the persisted status is still
    /// brought in line first, so a crashed server reads as stopped afterwards.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn stop(&self, id: &str) -> Result<StopOutcome> {
        self.ensure_exists(id)?;
        let mut slot = self.supervisor.lock(id).await;

        match slot.stop().await {
            Ok(outcome) => {
                self.registry.set_status(id, ServerStatus::Stopped)?;
                self.record_event(id, ServerLifecycleEvent::Stopped, Some(outcome.to_string()));
                Ok(outcome)
            }
            Err(e) => {
                self.reconcile(&mut slot)?;
                Err(e)
            }
        }
    }

    /// Stops the server if it is running, waits the settle delay, and starts
    /// it again.
    ///
    /// The settle delay gives the old process time to release its world lock
    /// and port. It is skipped when nothing was running.
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn restart(&self, id: &str) -> Result<ProcessInfo> {
        let record = self.registry.get(id)?;
        let mut slot = self.supervisor.lock(id).await;

        match slot.stop().await {
            Ok(outcome) => {
                self.registry.set_status(id, ServerStatus::Stopped)?;
                tracing::debug!(%outcome, "Stopped for restart, settling");
                tokio::time::sleep(self.supervisor.config().settle_delay()).await;
            }
            Err(Error::NotRunning(_)) => {
                tracing::debug!("Server was not running, starting directly");
                self.reconcile(&mut slot)?;
            }
            Err(e) => return Err(e),
        }

        let info = slot.start(&record, &self.registry.server_dir(id))?;
        self.persist_started(&mut slot).await?;
        self.record_event(id, ServerLifecycleEvent::Restarted, Some(format!("pid {}", info.pid)));

        Ok(info)
    }

    /// Writes a command line to the server's console.
    pub async fn send_command(&self, id: &str, command: &str) -> Result<()> {
        self.ensure_exists(id)?;
        let mut slot = self.supervisor.lock(id).await;

        match slot.send_command(command).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.reconcile(&mut slot)?;
                Err(e)
            }
        }
    }

    /// Attaches a console viewer.
    ///
    /// Never fails: an unknown or stopped server yields the not-running line
    /// and closes.
    pub async fn attach_console(&self, id: &str) -> ConsoleSubscription {
        if !self.registry.contains(id) {
            return ConsoleSubscription::not_running();
        }
        let mut slot = self.supervisor.lock(id).await;
        let subscription = slot.attach_console();
        if let Err(e) = self.reconcile(&mut slot) {
            tracing::warn!(server_id = %id, error = %e, "Failed to persist server status");
        }
        subscription
    }

    /// Snapshot of the live process, if any.
    pub async fn process_info(&self, id: &str) -> Result<Option<ProcessInfo>> {
        self.ensure_exists(id)?;
        let mut slot = self.supervisor.lock(id).await;
        let info = slot.info();
        self.reconcile(&mut slot)?;
        Ok(info)
    }

    /// Stops every running server, concurrently. Used on service shutdown.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<()> {
        let running = self.supervisor.running_ids().await;
        tracing::info!(num_running = running.len(), "Stopping all running servers");

        let results = futures::future::join_all(running.iter().map(|id| self.stop(id))).await;

        let mut first_error = None;
        for (id, result) in running.iter().zip(results) {
            match result {
                Ok(_) | Err(Error::NotRunning(_)) => {}
                Err(e) => {
                    tracing::error!(server_id = %id, error = %e, "Failed to stop server");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Recent lifecycle events of one server, newest first.
    pub fn server_events(&self, id: &str, limit: Option<usize>) -> Vec<ServerEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events
            .iter()
            .rev()
            .filter(|e| e.server_id == id)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn ensure_exists(&self, id: &str) -> Result<()> {
        if self.registry.contains(id) {
            Ok(())
        } else {
            Err(Error::ServerNotFound(id.to_string()))
        }
    }

    /// Persists `running` for the process just started in `slot`. If the
    /// record cannot be written the process is stopped again, so a failed
    /// start leaves nothing running.
    async fn persist_started(&self, slot: &mut ProcessSlot) -> Result<()> {
        let id = slot.server_id().to_string();
        let Err(e) = self.registry.set_status(&id, ServerStatus::Running) else {
            return Ok(());
        };

        tracing::error!(
            server_id = %id,
            error = %e,
            "Failed to persist running status, stopping server"
        );
        if let Err(stop_err) = slot.stop().await {
            tracing::warn!(server_id = %id, error = %stop_err, "Failed to stop unrecorded server");
        }
        Err(e)
    }

    /// Polls the slot and persists the observed status. Must be called with
    /// the slot guard held.
    fn reconcile(&self, slot: &mut ProcessSlot) -> Result<ServerRecord> {
        let id = slot.server_id().to_string();
        let observed = slot.poll();
        let persisted = self.registry.get(&id)?.status;

        if persisted == ServerStatus::Running && observed == ServerStatus::Stopped {
            self.record_event(&id, ServerLifecycleEvent::Exited, None);
        }

        self.registry.set_status(&id, observed)
    }

    fn record_event(&self, id: &str, event: ServerLifecycleEvent, details: Option<String>) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events.push_back(ServerEvent {
            server_id: id.to_string(),
            event,
            timestamp: SystemTime::now(),
            details,
        });

        // Limit event history
        if events.len() > EVENT_HISTORY_LIMIT {
            events.pop_front();
        }
    }
}
