/// Error handling module for craft-runner.
///
/// This module defines the error types used throughout the library.
/// Lifecycle conflicts (`AlreadyRunning`, `NotRunning`) are ordinary
/// errors here; the HTTP layer reports them as conflicts rather than
/// failures.
///
/// # Example
///
/// ```
/// use craft_runner::error::{Error, Result};
///
/// fn handle_error(result: Result<()>) {
///     match result {
///         Ok(_) => println!("Operation succeeded"),
///         Err(Error::ServerNotFound(id)) => println!("No server with id '{}'", id),
///         Err(Error::AlreadyRunning(id)) => println!("Server '{}' is already running", id),
///         Err(Error::MissingArtifact(path)) => println!("Install is incomplete: {}", path),
///         Err(e) => println!("Other error: {}", e),
///     }
/// }
/// ```
use thiserror::Error;

/// Errors that can occur in the craft-runner library.
///
/// Each variant carries enough context (usually the server id or a path)
/// to be shown to an operator as-is.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse configuration from a file or string.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration parsed but contains invalid values.
    ///
    /// This error occurs when:
    /// - The HTTP port is zero
    /// - The console buffer capacity is zero
    /// - The java runtime path is empty
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// No server with this id exists in the registry.
    #[error("Server not found: {0}")]
    ServerNotFound(String),

    /// A live process already exists for this server.
    #[error("Server is already running: {0}")]
    AlreadyRunning(String),

    /// No live process exists for this server.
    ///
    /// This error occurs when:
    /// - Stopping a server that was never started
    /// - Stopping a server whose process already exited on its own
    /// - Sending a console command to a stopped server
    #[error("Server is not running: {0}")]
    NotRunning(String),

    /// The install artifact the launch command needs is absent.
    ///
    /// This is a precondition failure; the launch is not retried.
    #[error("Missing install artifact: {0}")]
    MissingArtifact(String),

    /// The server kind has no launch command builder.
    #[error("Unknown server kind: {0}")]
    UnknownKind(String),

    /// A property override cannot be stored in `server.properties`.
    ///
    /// This error occurs when:
    /// - The key is empty, or starts with `#` or `!`
    /// - The key has leading or trailing whitespace, or contains `=`
    /// - The key or value contains a line break
    /// - Two keys name the same property once `-` and `_` are swapped
    #[error("Invalid property: {0}")]
    InvalidProperty(String),

    /// Error when spawning, signalling or waiting on a server process.
    #[error("Server process error: {0}")]
    Process(String),

    /// Reading or writing a persisted server record or properties file failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A persisted record could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other error not covered by the above categories.
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for craft-runner operations.
pub type Result<T> = std::result::Result<T, Error>;
