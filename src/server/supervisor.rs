use crate::config::SupervisorConfig;
use crate::console::ConsoleSubscription;
use crate::error::{Error, Result};
use crate::registry::{ServerRecord, ServerStatus};
use crate::server::process::{LaunchPlan, ManagedProcess, ProcessInfo, StopOutcome};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Exclusive access to one server's process slot.
///
/// Holding the guard linearizes every operation on that server id; other
/// ids are unaffected.
pub type SlotGuard = OwnedMutexGuard<ProcessSlot>;

/// The process slot of one server id: empty, or holding its live process.
pub struct ProcessSlot {
    /// Server id this slot belongs to
    server_id: String,
    /// The live process, if any
    process: Option<ManagedProcess>,
    /// Supervision settings
    config: Arc<SupervisorConfig>,
}

impl ProcessSlot {
    /// Server id this slot belongs to
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// Polls the live process, if any.
    ///
    /// A process found to have exited on its own is dropped from the slot
    /// here, which is how crashes surface.
    pub fn poll(&mut self) -> ServerStatus {
        let Some(process) = self.process.as_mut() else {
            return ServerStatus::Stopped;
        };

        match process.try_exit_status() {
            Ok(None) => ServerStatus::Running,
            Ok(Some(status)) => {
                tracing::info!(
                    server_id = %self.server_id,
                    pid = process.info().pid,
                    %status,
                    "Server process exited on its own"
                );
                self.process = None;
                ServerStatus::Stopped
            }
            Err(e) => {
                tracing::warn!(
                    server_id = %self.server_id,
                    error = %e,
                    "Could not poll server process"
                );
                ServerStatus::Running
            }
        }
    }

    /// Returns `true` if the slot holds a live process.
    pub fn is_running(&mut self) -> bool {
        self.poll() == ServerStatus::Running
    }

    /// Launches the server described by `record` from `install_dir`.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyRunning`] if a live process exists; nothing changes
    /// * [`Error::MissingArtifact`] / [`Error::UnknownKind`] from the launch plan
    /// * [`Error::Process`] if spawning fails
    pub fn start(&mut self, record: &ServerRecord, install_dir: &Path) -> Result<ProcessInfo> {
        if self.is_running() {
            return Err(Error::AlreadyRunning(self.server_id.clone()));
        }

        let plan = LaunchPlan::for_record(record, install_dir, &self.config)?;
        tracing::debug!(
            server_id = %self.server_id,
            command = ?plan.command_line(),
            "Launching server"
        );

        let process = ManagedProcess::spawn(&self.server_id, &plan, &self.config)?;
        let info = process.info().clone();
        self.process = Some(process);

        tracing::info!(
            server_id = %self.server_id,
            pid = info.pid,
            kind = %record.kind,
            "Server process started"
        );
        Ok(info)
    }

    /// Stops the live process, escalating to a kill after the grace period.
    ///
    /// The slot is empty afterwards whichever way the process ended.
    pub async fn stop(&mut self) -> Result<StopOutcome> {
        if !self.is_running() {
            return Err(Error::NotRunning(self.server_id.clone()));
        }

        let Some(process) = self.process.take() else {
            return Err(Error::NotRunning(self.server_id.clone()));
        };
        let pid = process.info().pid;

        let outcome = process.terminate(self.config.grace_period()).await?;
        tracing::info!(server_id = %self.server_id, pid, %outcome, "Server process stopped");
        Ok(outcome)
    }

    /// Writes a console command to the live process's stdin.
    pub async fn send_command(&mut self, line: &str) -> Result<()> {
        if !self.is_running() {
            return Err(Error::NotRunning(self.server_id.clone()));
        }

        match self.process.as_mut() {
            Some(process) => process.send_line(line).await,
            None => Err(Error::NotRunning(self.server_id.clone())),
        }
    }

    /// Attaches a console viewer. A stopped server yields the not-running
    /// line and closes without starting a reader.
    pub fn attach_console(&mut self) -> ConsoleSubscription {
        if !self.is_running() {
            return ConsoleSubscription::not_running();
        }

        match self.process.as_ref() {
            Some(process) => process.console().attach(),
            None => ConsoleSubscription::not_running(),
        }
    }

    /// Snapshot of the live process, if any.
    pub fn info(&mut self) -> Option<ProcessInfo> {
        if !self.is_running() {
            return None;
        }
        self.process.as_ref().map(|process| process.info().clone())
    }
}

/// Owns every live server process, one per server id.
///
/// Each id has its own slot behind an async mutex, so operations on one
/// server are linearized while different servers proceed concurrently.
/// The map of slots is the only shared mutable state and is held only long
/// enough to look a slot up.
///
/// # Examples
///
/// ```no_run
/// use craft_runner::config::SupervisorConfig;
/// use craft_runner::registry::ServerRegistry;
/// use craft_runner::server::ProcessSupervisor;
///
/// # async fn example() -> craft_runner::Result<()> {
/// let registry = ServerRegistry::open("servers")?;
/// registry.load()?;
/// let supervisor = ProcessSupervisor::new(SupervisorConfig::default());
///
/// let record = registry.get("4f1c")?;
/// let info = supervisor.start(&record, &registry.server_dir(&record.id)).await?;
/// println!("Started pid {}", info.pid);
///
/// supervisor.stop(&record.id).await?;
/// # Ok(())
/// # }
/// ```
pub struct ProcessSupervisor {
    /// Per-id process slots
    slots: Mutex<HashMap<String, Arc<AsyncMutex<ProcessSlot>>>>,
    /// Supervision settings shared with every slot
    config: Arc<SupervisorConfig>,
}

impl ProcessSupervisor {
    /// Create a new supervisor with no live processes
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Supervision settings
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Waits for exclusive access to the slot of `id`.
    pub async fn lock(&self, id: &str) -> SlotGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(id.to_string()).or_insert_with(|| {
                Arc::new(AsyncMutex::new(ProcessSlot {
                    server_id: id.to_string(),
                    process: None,
                    config: Arc::clone(&self.config),
                }))
            }))
        };
        slot.lock_owned().await
    }

    /// Start the server described by `record`. See [`ProcessSlot::start`].
    #[tracing::instrument(skip(self, record, install_dir), fields(server_id = %record.id))]
    pub async fn start(&self, record: &ServerRecord, install_dir: &Path) -> Result<ProcessInfo> {
        self.lock(&record.id).await.start(record, install_dir)
    }

    /// Stop a running server. See [`ProcessSlot::stop`].
    #[tracing::instrument(skip(self), fields(server_id = %id))]
    pub async fn stop(&self, id: &str) -> Result<StopOutcome> {
        self.lock(id).await.stop().await
    }

    /// Authoritative status of `id`, reaping an exited process.
    pub async fn status(&self, id: &str) -> ServerStatus {
        self.lock(id).await.poll()
    }

    /// Send a console command. See [`ProcessSlot::send_command`].
    #[tracing::instrument(skip(self, line), fields(server_id = %id))]
    pub async fn send_command(&self, id: &str, line: &str) -> Result<()> {
        self.lock(id).await.send_command(line).await
    }

    /// Attach a console viewer. See [`ProcessSlot::attach_console`].
    pub async fn attach_console(&self, id: &str) -> ConsoleSubscription {
        self.lock(id).await.attach_console()
    }

    /// Snapshot of the live process of `id`, if any.
    pub async fn info(&self, id: &str) -> Option<ProcessInfo> {
        self.lock(id).await.info()
    }

    /// Ids of every server with a live process.
    pub async fn running_ids(&self) -> Vec<String> {
        let candidates: Vec<String> = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.keys().cloned().collect()
        };

        let mut running = Vec::new();
        for id in candidates {
            if self.status(&id).await == ServerStatus::Running {
                running.push(id);
            }
        }
        running
    }
}
