//! DOM event capability

use chrono::NaiveDate;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Kinds of host events a subscription can listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomEventKind {
    /// Calendar visible window changed
    VisibleRangeChanged,
    /// Calendar event clicked
    EventClicked,
    /// Form control changed (campaign radio buttons)
    Change,
    /// Click inside a widget container
    Click,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    VisibleRangeChanged { start: NaiveDate, end: NaiveDate },
    EventClicked { id: String },
    Change { name: String, value: String },
    /// `direction` is the `data-direction` attribute of the closest element
    /// carrying one, if any.
    Click { direction: Option<String> },
}

impl DomEvent {
    pub fn kind(&self) -> DomEventKind {
        match self {
            DomEvent::VisibleRangeChanged { .. } => DomEventKind::VisibleRangeChanged,
            DomEvent::EventClicked { .. } => DomEventKind::EventClicked,
            DomEvent::Change { .. } => DomEventKind::Change,
            DomEvent::Click { .. } => DomEventKind::Click,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn Fn(&DomEvent) + Send + Sync>;

/// Abstract `addEventListener` / `removeEventListener` pair
pub trait DomEventSource: Send + Sync {
    fn add_listener(&self, kind: DomEventKind, listener: Listener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId);
}

/// In-process event source for hosts without their own event loop
#[derive(Default)]
pub struct LocalEventSource {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, DomEventKind, Arc<Listener>)>>,
}

impl LocalEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every listener registered for its kind
    pub fn emit(&self, event: &DomEvent) {
        let kind = event.kind();
        let matching: Vec<Arc<Listener>> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, listener)| Arc::clone(listener))
                .collect(),
            Err(e) => {
                tracing::error!("listener registry poisoned: {}", e);
                return;
            }
        };
        // called outside the lock so a listener may (un)register others
        for listener in matching {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl DomEventSource for LocalEventSource {
    fn add_listener(&self, kind: DomEventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, kind, Arc::new(listener)));
        }
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|(listener_id, _, _)| *listener_id != id);
        }
    }
}
