//! Protocol Events
//!
//! Events emitted while elections, failures and recoveries unfold, and the
//! sink interface callers implement to observe them.

mod event;
mod sink;

pub use event::{ElectionEvent, EventKind, MessageKind};
pub use sink::{EventLog, EventSink, Subscribers, TracingSink};
