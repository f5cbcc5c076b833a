use crate::console::subscription::{ConsoleSubscription, SubscriberId};
use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// State shared between the reader thread and attach/detach callers.
struct ConsoleState {
    /// Live subscribers and their delivery channels
    subscribers: HashMap<SubscriberId, mpsc::Sender<String>>,
    /// Most recent lines, oldest first
    backlog: VecDeque<String>,
    /// Set once the stream ended or the process was stopped
    closed: bool,
}

pub(crate) struct Shared {
    server_id: String,
    state: Mutex<ConsoleState>,
    next_subscriber: AtomicU64,
    /// Per-subscriber channel capacity for live lines
    capacity: usize,
    /// Maximum number of backlog lines kept
    backlog_limit: usize,
}

impl Shared {
    fn publish(&self, line: String) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return;
        }

        if self.backlog_limit > 0 {
            if state.backlog.len() == self.backlog_limit {
                state.backlog.pop_front();
            }
            state.backlog.push_back(line.clone());
        }

        // Full or closed channels are dropped from the set; the reader never waits.
        state.subscribers.retain(|id, sender| match sender.try_send(line.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(
                    server_id = %self.server_id,
                    subscriber = %id,
                    "Console subscriber fell behind, detaching"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::trace!(
                    server_id = %self.server_id,
                    subscriber = %id,
                    "Console subscriber went away"
                );
                false
            }
        });
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.closed {
            state.closed = true;
            let remaining = state.subscribers.len();
            // Dropping the senders ends every subscriber's stream.
            state.subscribers.clear();
            tracing::debug!(
                server_id = %self.server_id,
                subscribers = remaining,
                "Console closed"
            );
        }
    }

    pub(crate) fn detach(&self, id: SubscriberId) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = state.subscribers.remove(&id).is_some();
        if removed {
            tracing::trace!(
                server_id = %self.server_id,
                subscriber = %id,
                "Console subscriber detached"
            );
        }
        removed
    }
}

/// Fans a running process's console output out to any number of viewers.
///
/// A single dedicated reader thread drains the process's combined
/// stdout/stderr pipe line by line. Each line is offered to every attached
/// subscriber without waiting: a subscriber whose buffer is full, or whose
/// receiving side is gone, is detached on the spot and the others carry on.
/// When the stream ends, every subscriber's stream ends with it.
///
/// Cloning yields another handle to the same broadcaster.
///
/// # Examples
///
/// ```no_run
/// use craft_runner::console::ConsoleBroadcaster;
///
/// # async fn example(pipe: std::io::PipeReader) -> craft_runner::Result<()> {
/// let console = ConsoleBroadcaster::spawn("my-server", pipe, 256, 100)?;
/// let mut subscription = console.attach();
/// while let Some(line) = subscription.recv().await {
///     println!("{}", line);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConsoleBroadcaster {
    shared: Arc<Shared>,
    reader: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ConsoleBroadcaster {
    /// Starts the reader thread over `source`.
    ///
    /// # Arguments
    ///
    /// * `server_id` - Id of the server the stream belongs to, used in logs
    /// * `source` - The process's output stream
    /// * `capacity` - Live lines buffered per subscriber before it is detached
    /// * `backlog_limit` - Recent lines replayed to new subscribers
    pub fn spawn<R>(
        server_id: &str,
        source: R,
        capacity: usize,
        backlog_limit: usize,
    ) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let shared = Arc::new(Shared {
            server_id: server_id.to_string(),
            state: Mutex::new(ConsoleState {
                subscribers: HashMap::new(),
                backlog: VecDeque::with_capacity(backlog_limit),
                closed: false,
            }),
            next_subscriber: AtomicU64::new(1),
            capacity: capacity.max(1),
            backlog_limit,
        });

        let reader_shared = Arc::clone(&shared);
        let thread_name: String = format!("console-{}", server_id).chars().take(15).collect();
        let reader = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || read_console(reader_shared, source))
            .map_err(|e| Error::Process(format!("Failed to spawn console reader: {}", e)))?;

        Ok(Self {
            shared,
            reader: Arc::new(Mutex::new(Some(reader))),
        })
    }

    /// Id of the server this console belongs to.
    pub fn server_id(&self) -> &str {
        &self.shared.server_id
    }

    /// Attaches a new subscriber.
    ///
    /// The backlog is queued first, then live lines follow in order. Attaching
    /// to a closed console yields the backlog and then ends.
    pub fn attach(&self) -> ConsoleSubscription {
        let id = SubscriberId(self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed));

        let mut state = self.shared.state.lock().unwrap_or_else(PoisonError::into_inner);

        let (sender, receiver) = mpsc::channel(self.shared.capacity + state.backlog.len());
        for line in &state.backlog {
            // Capacity covers the whole backlog, so this cannot fail.
            let _ = sender.try_send(line.clone());
        }

        if state.closed {
            return ConsoleSubscription::detached(id, receiver);
        }

        state.subscribers.insert(id, sender);
        tracing::debug!(
            server_id = %self.shared.server_id,
            subscriber = %id,
            subscribers = state.subscribers.len(),
            "Console subscriber attached"
        );

        ConsoleSubscription::new(id, receiver, Arc::downgrade(&self.shared))
    }

    /// Detaches a subscriber by id. Returns `false` if it was already gone.
    pub fn detach(&self, id: SubscriberId) -> bool {
        self.shared.detach(id)
    }

    /// Ends every subscriber's stream and stops accepting new lines.
    ///
    /// The reader thread keeps draining the pipe until end-of-stream so the
    /// process never blocks on a full pipe, but nothing more is delivered.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Returns `true` once the stream ended or [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }

    /// Returns `true` if the reader thread has exited.
    pub fn reader_finished(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_none_or(|handle| handle.is_finished())
    }
}

fn read_console<R: Read>(shared: Arc<Shared>, source: R) {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => shared.publish(decode_line(&buf)),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(server_id = %shared.server_id, error = %e, "Console read failed");
                break;
            }
        }
    }

    tracing::debug!(server_id = %shared.server_id, "Console stream ended");
    shared.close();
}

fn decode_line(raw: &[u8]) -> String {
    let line = String::from_utf8_lossy(raw);
    line.trim_end_matches(['\n', '\r']).to_string()
}
