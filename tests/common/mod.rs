// Shared fixtures for the integration test crates. Not every crate uses
// every helper.
#![allow(dead_code)]

use craft_runner::config::SupervisorConfig;
use craft_runner::console::ConsoleSubscription;
use craft_runner::registry::{NewServer, ServerKind, ServerRecord, ServerRegistry, ServerStatus};
use craft_runner::server::{LifecycleOrchestrator, ProcessSupervisor};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Prints a line and then idles until terminated.
pub const IDLE_SCRIPT: &str = "#!/bin/sh\necho ready\nexec sleep 30\n";

/// Echoes every stdin line back prefixed with `got `.
pub const ECHO_SCRIPT: &str = "#!/bin/sh\necho ready\nwhile read line; do echo \"got $line\"; done\n";

/// Ignores the termination signal, so only a kill stops it.
pub const STUBBORN_SCRIPT: &str = "#!/bin/sh\ntrap '' TERM\necho ready\nwhile true; do sleep 1; done\n";

/// Writes to both streams and exits with a failure code.
pub const CRASH_SCRIPT: &str = "#!/bin/sh\necho starting\necho fatal error >&2\nexit 3\n";

/// Interleaves stdout and stderr, then idles.
pub const MIXED_SCRIPT: &str = "#!/bin/sh\necho one\necho two >&2\necho three\necho four >&2\nexec sleep 30\n";

/// How long a test waits for a process to do something.
pub const WAIT: Duration = Duration::from_secs(5);

/// Supervision settings with short delays for tests.
pub fn test_config() -> SupervisorConfig {
    SupervisorConfig {
        grace_period_secs: 1,
        settle_delay_secs: 0,
        ..SupervisorConfig::default()
    }
}

pub struct Fixture {
    /// Keeps the servers directory alive for the duration of the test
    pub dir: TempDir,
    pub registry: Arc<ServerRegistry>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub orchestrator: Arc<LifecycleOrchestrator>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: SupervisorConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ServerRegistry::open(dir.path()).unwrap());
        let supervisor = Arc::new(ProcessSupervisor::new(config));
        let orchestrator = Arc::new(LifecycleOrchestrator::new(
            Arc::clone(&registry),
            Arc::clone(&supervisor),
        ));

        Self {
            dir,
            registry,
            supervisor,
            orchestrator,
        }
    }

    /// Registers a Bedrock server whose executable is the given shell script.
    pub fn install(&self, name: &str, script: &str) -> ServerRecord {
        let record = self.registry.create(new_server(name, ServerKind::Bedrock)).unwrap();
        write_script(&self.registry.server_dir(&record.id), "bedrock_server", script);
        record
    }
}

pub fn new_server(name: &str, kind: ServerKind) -> NewServer {
    NewServer {
        name: name.to_string(),
        kind,
        version: "1.21.0".to_string(),
        ram: 1,
    }
}

pub fn write_script(dir: &Path, file_name: &str, script: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file_name), script).unwrap();
}

/// Next console line, or `None` if the stream ended or nothing came in time.
pub async fn next_line(subscription: &mut ConsoleSubscription) -> Option<String> {
    tokio::time::timeout(WAIT, subscription.recv()).await.ok().flatten()
}

/// Reads lines until one equals `expected`. Returns `false` if the stream
/// ended or timed out first.
pub async fn wait_for_line(subscription: &mut ConsoleSubscription, expected: &str) -> bool {
    while let Some(line) = next_line(subscription).await {
        if line == expected {
            return true;
        }
    }
    false
}

/// Polls the supervisor until `id` reaches `status`.
pub async fn wait_for_status(
    supervisor: &ProcessSupervisor,
    id: &str,
    status: ServerStatus,
) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if supervisor.status(id).await == status {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
