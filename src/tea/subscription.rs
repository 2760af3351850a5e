//! Long-lived listeners whose lifecycle follows the model

use crate::host::{DomEvent, DomEventKind, DomEventSource, ListenerId};
use crate::tea::Dispatcher;
use std::sync::Arc;

/// A keyed external listener.
///
/// The runtime calls `start` when the key first appears in the desired set and
/// `stop` when it disappears. While the key stays desired the running instance
/// is left alone.
pub trait Subscription<Msg>: Send {
    fn key(&self) -> &str;

    fn start(&mut self, dispatcher: Dispatcher<Msg>);

    fn stop(&mut self);
}

type ToMsg<Msg> = Arc<dyn Fn(&DomEvent) -> Option<Msg> + Send + Sync>;

/// Subscription translating host DOM events into messages
pub struct Listen<Msg> {
    key: String,
    source: Arc<dyn DomEventSource>,
    kinds: Vec<DomEventKind>,
    to_msg: ToMsg<Msg>,
    listeners: Vec<ListenerId>,
}

impl<Msg: Send + 'static> Listen<Msg> {
    pub fn new<F>(
        key: impl Into<String>,
        source: Arc<dyn DomEventSource>,
        kinds: &[DomEventKind],
        to_msg: F,
    ) -> Self
    where
        F: Fn(&DomEvent) -> Option<Msg> + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            source,
            kinds: kinds.to_vec(),
            to_msg: Arc::new(to_msg),
            listeners: Vec::new(),
        }
    }

    /// Box the subscription for a `Program::subscriptions` list
    pub fn boxed(self) -> Box<dyn Subscription<Msg>> {
        Box::new(self)
    }
}

impl<Msg: Send + 'static> Subscription<Msg> for Listen<Msg> {
    fn key(&self) -> &str {
        &self.key
    }

    fn start(&mut self, dispatcher: Dispatcher<Msg>) {
        for kind in &self.kinds {
            let to_msg = Arc::clone(&self.to_msg);
            let dispatcher = dispatcher.clone();
            let id = self.source.add_listener(
                *kind,
                Box::new(move |event| {
                    if let Some(msg) = to_msg(event) {
                        dispatcher.dispatch(msg);
                    }
                }),
            );
            self.listeners.push(id);
        }
    }

    fn stop(&mut self) {
        for id in self.listeners.drain(..) {
            self.source.remove_listener(id);
        }
    }
}
