use crate::console::broadcaster::Shared;
use std::fmt;
use std::sync::Weak;
use tokio::sync::mpsc;

/// Line sent to a viewer attaching to a server with no live process.
pub const NOT_RUNNING_LINE: &str = "[craft-runner] Server is not running.";

/// Identifies one subscriber within a broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub(crate) u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live console viewer.
///
/// Lines arrive in the order the process wrote them. `recv` returning
/// `None` means the stream is over: the process exited, the server was
/// stopped, the subscriber fell too far behind, or it was detached.
/// Dropping the subscription detaches it.
pub struct ConsoleSubscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<String>,
    broadcaster: Option<Weak<Shared>>,
}

impl ConsoleSubscription {
    pub(crate) fn new(
        id: SubscriberId,
        receiver: mpsc::Receiver<String>,
        broadcaster: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            receiver,
            broadcaster: Some(broadcaster),
        }
    }

    /// A subscription that drains what was already queued and then ends.
    pub(crate) fn detached(id: SubscriberId, receiver: mpsc::Receiver<String>) -> Self {
        Self {
            id,
            receiver,
            broadcaster: None,
        }
    }

    /// A subscription yielding [`NOT_RUNNING_LINE`] once and then ending.
    pub fn not_running() -> Self {
        let (sender, receiver) = mpsc::channel(1);
        let _ = sender.try_send(NOT_RUNNING_LINE.to_string());
        Self::detached(SubscriberId(0), receiver)
    }

    /// Subscriber id
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next line. `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Returns `true` while the subscriber is still registered with its
    /// broadcaster.
    pub fn is_attached(&self) -> bool {
        self.broadcaster
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
            && !self.receiver.is_closed()
    }

    /// Detaches from the broadcaster. Lines already queued can still be
    /// received. Calling this more than once is harmless.
    pub fn detach(&mut self) {
        if let Some(shared) = self.broadcaster.take().and_then(|weak| weak.upgrade()) {
            shared.detach(self.id);
        }
        self.receiver.close();
    }
}

impl Drop for ConsoleSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for ConsoleSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleSubscription")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}
