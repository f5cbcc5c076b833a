//! Request and response bodies of the HTTP API.

use crate::server::ProcessInfo;
use serde::{Deserialize, Serialize};

/// Acknowledgement returned by mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Human-readable outcome
    pub message: String,
    /// The new process, for start and restart
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessInfo>,
    /// How the process ended, for stop
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
}

impl MessageResponse {
    /// A plain message
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            process: None,
            outcome: None,
        }
    }
}

/// Body of `POST /servers/{id}/command`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Console command, without trailing newline
    pub command: String,
}

/// Query of `GET /servers/{id}/events`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    /// Maximum number of events, newest first
    pub limit: Option<usize>,
}
