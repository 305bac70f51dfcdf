//! Event Sinks
//!
//! Push-callback consumers of protocol events. Sinks are owned by the
//! caller and invoked synchronously, in event order.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::{ElectionEvent, EventKind};

/// Consumer of protocol events
pub trait EventSink: Send + Sync {
    /// Called once per event, in the order events occur
    fn on_event(&self, event: &ElectionEvent);
}

impl EventSink for mpsc::UnboundedSender<ElectionEvent> {
    fn on_event(&self, event: &ElectionEvent) {
        // A dropped receiver only means nobody is listening anymore
        let _ = self.send(event.clone());
    }
}

/// Fan-out over every registered sink
#[derive(Default, Clone)]
pub struct Subscribers {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink
    pub fn subscribe(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for Subscribers {
    fn on_event(&self, event: &ElectionEvent) {
        for sink in &self.sinks {
            sink.on_event(event);
        }
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_event(&self, event: &ElectionEvent) {
        match event.kind() {
            EventKind::Message => tracing::debug!("{}", event),
            EventKind::Started | EventKind::Elected | EventKind::Recovered => {
                tracing::info!("{}", event)
            }
            EventKind::Failed | EventKind::Detected => tracing::warn!("{}", event),
            EventKind::Leaderless => tracing::error!("{}", event),
        }
    }
}

/// In-memory record of every event seen
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ElectionEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ElectionEvent>> {
        // Events are plain data; a panicking writer cannot leave them half-updated
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of every recorded event
    pub fn events(&self) -> Vec<ElectionEvent> {
        self.lock().clone()
    }

    /// Remove and return every recorded event
    pub fn drain(&self) -> Vec<ElectionEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of recorded events of one kind
    pub fn count(&self, kind: EventKind) -> usize {
        self.lock().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl EventSink for EventLog {
    fn on_event(&self, event: &ElectionEvent) {
        self.lock().push(event.clone());
    }
}
