// src/server/process.rs
use crate::config::SupervisorConfig;
use crate::console::ConsoleBroadcaster;
use crate::error::{Error, Result};
use crate::registry::{ServerKind, ServerRecord};
use async_process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use futures_lite::io::AsyncWriteExt;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Install artifact of a Java server, relative to its directory.
pub const JAVA_ARTIFACT: &str = "server.jar";
/// Install artifact of a Bedrock server, relative to its directory.
pub const BEDROCK_ARTIFACT: &str = "bedrock_server";

/// Everything needed to spawn a server process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    /// Program to execute
    pub program: PathBuf,
    /// Program arguments
    pub args: Vec<String>,
    /// Working directory of the child
    pub working_dir: PathBuf,
    /// Variables added to the inherited environment
    pub env: Vec<(String, OsString)>,
    /// File that must be made executable before launch
    pub make_executable: Option<PathBuf>,
}

impl LaunchPlan {
    /// Builds the launch plan for a record's kind.
    ///
    /// # Errors
    ///
    /// * [`Error::MissingArtifact`] if the kind's install artifact is absent
    /// * [`Error::UnknownKind`] if the kind has no launch builder
    pub fn for_record(
        record: &ServerRecord,
        install_dir: &Path,
        config: &SupervisorConfig,
    ) -> Result<Self> {
        match &record.kind {
            ServerKind::Java => Self::java(record.ram, install_dir, &config.java_path),
            ServerKind::Bedrock => Self::bedrock(install_dir),
            ServerKind::Unknown(kind) => Err(Error::UnknownKind(kind.clone())),
        }
    }

    /// `java -Xmx<ram>G -Xms<ram>G -jar server.jar nogui`, run inside the
    /// install directory.
    pub fn java(ram_gb: u32, install_dir: &Path, java_path: &str) -> Result<Self> {
        let dir = resolve_install_dir(install_dir, JAVA_ARTIFACT)?;
        let jar = dir.join(JAVA_ARTIFACT);

        Ok(Self {
            program: PathBuf::from(java_path),
            args: vec![
                format!("-Xmx{}G", ram_gb),
                format!("-Xms{}G", ram_gb),
                "-jar".to_string(),
                jar.to_string_lossy().into_owned(),
                "nogui".to_string(),
            ],
            working_dir: dir,
            env: Vec::new(),
            make_executable: None,
        })
    }

    /// The native `bedrock_server` binary, run inside the install directory
    /// with that directory on the shared-library search path.
    pub fn bedrock(install_dir: &Path) -> Result<Self> {
        let dir = resolve_install_dir(install_dir, BEDROCK_ARTIFACT)?;
        let executable = dir.join(BEDROCK_ARTIFACT);

        let mut library_path = OsString::from(dir.as_os_str());
        if let Some(existing) = std::env::var_os("LD_LIBRARY_PATH") {
            if !existing.is_empty() {
                library_path.push(":");
                library_path.push(existing);
            }
        }

        Ok(Self {
            program: executable.clone(),
            args: Vec::new(),
            working_dir: dir,
            env: vec![("LD_LIBRARY_PATH".to_string(), library_path)],
            make_executable: Some(executable),
        })
    }

    /// Program and arguments as display strings.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn prepare(&self) -> Result<()> {
        if let Some(path) = &self.make_executable {
            set_executable(path)?;
        }
        Ok(())
    }
}

fn resolve_install_dir(install_dir: &Path, artifact: &str) -> Result<PathBuf> {
    let artifact_path = install_dir.join(artifact);
    if !artifact_path.is_file() {
        return Err(Error::MissingArtifact(artifact_path.display().to_string()));
    }

    // Absolute paths keep the program unambiguous once the cwd changes.
    std::fs::canonicalize(install_dir).map_err(|e| {
        Error::Io(format!(
            "Failed to resolve install directory {}: {}",
            install_dir.display(),
            e
        ))
    })
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        Error::Io(format!(
            "Failed to make {} executable: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Snapshot of a live process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    /// OS process id
    pub pid: u32,
    /// Wall-clock start time
    pub started_at: SystemTime,
    /// Program and arguments
    pub command: Vec<String>,
    /// Working directory
    pub working_dir: PathBuf,
}

/// How a stopped process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited within the grace period after the termination signal
    Graceful,
    /// Killed after the grace period ran out
    Forced,
}

impl fmt::Display for StopOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOutcome::Graceful => f.write_str("graceful"),
            StopOutcome::Forced => f.write_str("forced"),
        }
    }
}

/// A running server process and its console.
///
/// Owned by exactly one supervisor slot. Dropping it kills the child and
/// closes the console.
pub struct ManagedProcess {
    /// Child process
    child: Child,
    /// Child stdin, used for console commands
    stdin: Option<ChildStdin>,
    /// Console fan-out over the combined stdout/stderr pipe
    console: ConsoleBroadcaster,
    /// Launch snapshot
    info: ProcessInfo,
}

impl ManagedProcess {
    /// Spawns the process described by `plan`.
    ///
    /// stdout and stderr share a single pipe so the console preserves the
    /// order in which the process wrote to both.
    pub fn spawn(server_id: &str, plan: &LaunchPlan, config: &SupervisorConfig) -> Result<Self> {
        plan.prepare()?;

        let (output, output_writer) = std::io::pipe()
            .map_err(|e| Error::Process(format!("Failed to create output pipe: {}", e)))?;
        let error_writer = output_writer
            .try_clone()
            .map_err(|e| Error::Process(format!("Failed to clone output pipe: {}", e)))?;

        // The command owns the parent's copies of the write ends; it must be
        // dropped before the reader can ever see end-of-stream.
        let mut child = {
            let mut command = Command::from(new_group_command(&plan.program));
            command
                .args(&plan.args)
                .current_dir(&plan.working_dir)
                .envs(plan.env.iter().map(|(key, value)| (key, value)))
                .stdin(Stdio::piped())
                .stdout(output_writer)
                .stderr(error_writer)
                .kill_on_drop(true);

            command
                .spawn()
                .map_err(|e| Error::Process(format!("Failed to start process: {}", e)))?
        };

        let stdin = child.stdin.take();
        let info = ProcessInfo {
            pid: child.id(),
            started_at: SystemTime::now(),
            command: plan.command_line(),
            working_dir: plan.working_dir.clone(),
        };
        let console = ConsoleBroadcaster::spawn(
            server_id,
            output,
            config.console_buffer,
            config.backlog_lines,
        )?;

        Ok(Self {
            child,
            stdin,
            console,
            info,
        })
    }

    /// Launch snapshot
    pub fn info(&self) -> &ProcessInfo {
        &self.info
    }

    /// The process's console
    pub fn console(&self) -> &ConsoleBroadcaster {
        &self.console
    }

    /// Polls the process without waiting. `Some` once it has exited.
    pub fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        self.child
            .try_status()
            .map_err(|e| Error::Process(format!("Failed to poll process: {}", e)))
    }

    /// Writes one line to the process's stdin.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::Process("Process stdin is not available".to_string()))?;

        let mut data = line.trim_end_matches(['\n', '\r']).as_bytes().to_vec();
        data.push(b'\n');

        stdin
            .write_all(&data)
            .await
            .map_err(|e| Error::Process(format!("Failed to write to stdin: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::Process(format!("Failed to flush stdin: {}", e)))
    }

    /// Stops the process: termination signal first, kill once `grace` runs out.
    ///
    /// Signals go to the whole process group. Whatever is left of the group
    /// once the process itself has exited is killed, so nothing it spawned
    /// keeps the console pipe open.
    pub async fn terminate(mut self, grace: Duration) -> Result<StopOutcome> {
        let pid = self.info.pid;

        let outcome = match signal_group(pid, GroupSignal::Terminate) {
            Ok(()) => {
                let waited = tokio::time::timeout(grace, self.child.status()).await;
                match waited {
                    Ok(Ok(status)) => {
                        tracing::debug!(pid, %status, "Process exited after termination signal");
                        StopOutcome::Graceful
                    }
                    Ok(Err(e)) => {
                        return Err(Error::Process(format!(
                            "Failed to wait for process: {}",
                            e
                        )));
                    }
                    Err(_) => {
                        tracing::warn!(
                            pid,
                            grace_secs = grace.as_secs_f64(),
                            "Process ignored termination signal, killing"
                        );
                        self.kill_and_wait().await?;
                        StopOutcome::Forced
                    }
                }
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "Could not signal process, killing");
                self.kill_and_wait().await?;
                StopOutcome::Forced
            }
        };

        if signal_group(pid, GroupSignal::Kill).is_ok() {
            tracing::debug!(pid, "Killed processes left in the server's group");
        }
        self.console.close();
        Ok(outcome)
    }

    async fn kill_and_wait(&mut self) -> Result<()> {
        if let Err(e) = signal_group(self.info.pid, GroupSignal::Kill) {
            tracing::debug!(pid = self.info.pid, error = %e, "Could not kill process group");
            if let Err(e) = self.child.kill() {
                tracing::warn!(pid = self.info.pid, error = %e, "Kill failed");
            }
        }
        self.child
            .status()
            .await
            .map(|_| ())
            .map_err(|e| Error::Process(format!("Failed to wait for killed process: {}", e)))
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        // kill_on_drop only reaches the child itself
        if matches!(self.child.try_status(), Ok(None)) {
            let _ = signal_group(self.info.pid, GroupSignal::Kill);
        }
        self.console.close();
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

/// A command whose child leads a new process group with its own pid as id.
#[cfg(unix)]
fn new_group_command(program: &Path) -> std::process::Command {
    use std::os::unix::process::CommandExt;

    let mut command = std::process::Command::new(program);
    command.process_group(0);
    command
}

#[cfg(not(unix))]
fn new_group_command(program: &Path) -> std::process::Command {
    std::process::Command::new(program)
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: GroupSignal) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    let signal = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    killpg(Pid::from_raw(pgid), signal).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: GroupSignal) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "process group signals are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record(kind: ServerKind) -> ServerRecord {
        ServerRecord {
            id: "test".to_string(),
            name: "Test".to_string(),
            kind,
            version: "1.0".to_string(),
            ram: 2,
            status: Default::default(),
            properties: BTreeMap::new(),
        }
    }

    #[test]
    fn test_java_plan() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(JAVA_ARTIFACT), b"jar").unwrap();

        let plan = LaunchPlan::for_record(
            &record(ServerKind::Java),
            dir.path(),
            &SupervisorConfig::default(),
        )
        .unwrap();
        let canonical = std::fs::canonicalize(dir.path()).unwrap();

        assert_eq!(plan.program, PathBuf::from("java"));
        assert_eq!(
            plan.args,
            vec![
                "-Xmx2G".to_string(),
                "-Xms2G".to_string(),
                "-jar".to_string(),
                canonical.join(JAVA_ARTIFACT).to_string_lossy().into_owned(),
                "nogui".to_string(),
            ]
        );
        assert_eq!(plan.working_dir, canonical);
        assert!(plan.make_executable.is_none());
    }

    #[test]
    fn test_bedrock_plan_sets_library_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BEDROCK_ARTIFACT), b"elf").unwrap();

        let plan = LaunchPlan::for_record(
            &record(ServerKind::Bedrock),
            dir.path(),
            &SupervisorConfig::default(),
        )
        .unwrap();
        let canonical = std::fs::canonicalize(dir.path()).unwrap();

        assert_eq!(plan.program, canonical.join(BEDROCK_ARTIFACT));
        assert_eq!(plan.working_dir, canonical);
        let (key, value) = &plan.env[0];
        assert_eq!(key, "LD_LIBRARY_PATH");
        assert!(value.to_string_lossy().starts_with(&*canonical.to_string_lossy()));
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();

        let config = SupervisorConfig::default();
        for kind in [ServerKind::Java, ServerKind::Bedrock] {
            let err = LaunchPlan::for_record(&record(kind), dir.path(), &config).unwrap_err();
            assert!(matches!(err, Error::MissingArtifact(_)));
        }
    }

    #[test]
    fn test_unknown_kind() {
        let dir = tempfile::tempdir().unwrap();

        let err = LaunchPlan::for_record(
            &record(ServerKind::Unknown("forge".to_string())),
            dir.path(),
            &SupervisorConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnknownKind(kind) if kind == "forge"));
    }
}
