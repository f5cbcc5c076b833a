use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The server implementation family, which decides how a server is launched.
///
/// Kinds are persisted as lowercase strings. A string outside the known set
/// is kept as [`ServerKind::Unknown`] so the record still loads; starting such
/// a server fails with [`Error::UnknownKind`](crate::Error::UnknownKind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerKind {
    /// Java edition, launched through a JVM with `server.jar`.
    Java,
    /// Bedrock dedicated server, a native executable.
    Bedrock,
    /// Any other persisted kind string.
    Unknown(String),
}

impl ServerKind {
    /// Persisted name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            ServerKind::Java => "java",
            ServerKind::Bedrock => "bedrock",
            ServerKind::Unknown(other) => other,
        }
    }
}

impl From<String> for ServerKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "java" => ServerKind::Java,
            "bedrock" => ServerKind::Bedrock,
            _ => ServerKind::Unknown(value),
        }
    }
}

impl From<ServerKind> for String {
    fn from(kind: ServerKind) -> Self {
        match kind {
            ServerKind::Unknown(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a server as reported and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// No live process
    #[default]
    Stopped,
    /// A live process exists
    Running,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Stopped => f.write_str("stopped"),
            ServerStatus::Running => f.write_str("running"),
        }
    }
}

/// A property override value as supplied by a client.
///
/// Values are opaque strings on disk; booleans render as lowercase
/// `true`/`false` and numbers with their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean flag
    Bool(bool),
    /// Integer or float
    Number(serde_json::Number),
    /// Free-form text
    String(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Number(n) => write!(f, "{}", n),
            PropertyValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value.into())
    }
}

/// Durable description of one managed server.
///
/// Persisted as `config.json` inside the server's directory.
///
/// # Examples
///
/// ```
/// use craft_runner::registry::{ServerKind, ServerRecord, ServerStatus};
///
/// let json = r#"{
///     "id": "4f1c", "name": "Survival", "type": "java",
///     "version": "1.21.1", "ram": 4, "status": "running", "properties": {}
/// }"#;
/// let record: ServerRecord = serde_json::from_str(json).unwrap();
/// assert_eq!(record.kind, ServerKind::Java);
/// assert_eq!(record.status, ServerStatus::Running);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Unique, immutable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Implementation family
    #[serde(rename = "type")]
    pub kind: ServerKind,
    /// Game version identifier
    pub version: String,
    /// Memory allocation in gigabytes
    pub ram: u32,
    /// Last known status
    #[serde(default)]
    pub status: ServerStatus,
    /// Property overrides applied through the API
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// Fields supplied by the installer for a freshly installed server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewServer {
    /// Display name
    pub name: String,
    /// Implementation family
    #[serde(rename = "type")]
    pub kind: ServerKind,
    /// Game version identifier
    pub version: String,
    /// Memory allocation in gigabytes
    pub ram: u32,
}
