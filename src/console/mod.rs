//! Live console streaming.
//!
//! Each running server gets one [`ConsoleBroadcaster`], started together
//! with its process. Viewers obtain a [`ConsoleSubscription`] through the
//! supervisor; a server that is not running answers with a single
//! [`NOT_RUNNING_LINE`] instead, without starting a reader.
mod broadcaster;
mod subscription;

pub use broadcaster::ConsoleBroadcaster;
pub use subscription::{ConsoleSubscription, NOT_RUNNING_LINE, SubscriberId};
