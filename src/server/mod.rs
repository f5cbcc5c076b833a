/// Server process management for craft-runner.
///
/// This module owns the live game-server processes and the coordination
/// between them and the persisted catalog. All public lifecycle operations
/// are instrumented with `tracing` spans.
///
/// # Components
///
/// * `process` - Launch plans per server kind and the live process handle
/// * `supervisor` - One process slot per server id, start/stop/status
/// * `lifecycle` - Compound operations that keep the registry in step
///
/// # Examples
///
/// Starting and restarting a server:
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
/// let first = orchestrator.start("4f1c").await?;
/// let second = orchestrator.restart("4f1c").await?;
/// assert_ne!(first.pid, second.pid);
/// # Ok(())
/// # }
/// ```
///
/// Watching a console:
///
/// ```no_run
/// # use craft_runner::server::LifecycleOrchestrator;
/// # async fn example(orchestrator: &LifecycleOrchestrator) {
/// let mut console = orchestrator.attach_console("4f1c").await;
/// while let Some(line) = console.recv().await {
///     println!("{}", line);
/// }
/// # }
/// ```
pub mod lifecycle;
pub mod process;
pub mod supervisor;

pub use lifecycle::{LifecycleOrchestrator, ServerEvent, ServerLifecycleEvent};
pub use process::{LaunchPlan, ManagedProcess, ProcessInfo, StopOutcome};
pub use supervisor::{ProcessSlot, ProcessSupervisor, SlotGuard};
