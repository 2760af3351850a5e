//! Message dispatcher and update loop
//!
//! `App` owns exactly one model and processes one message at a time:
//! update, shape check, commit, command, view, subscription refresh.
//! Messages dispatched from commands or subscriptions are queued on a channel
//! and only handled after the current message has run to completion, so two
//! `update` calls never interleave.

use crate::tea::{Command, RuntimeError, RuntimeResult, Subscription};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use tokio::sync::mpsc;

pub(crate) enum Envelope<Msg> {
    Msg(Msg),
    Shutdown,
}

/// Cloneable handle used by commands and subscriptions to feed messages back
pub struct Dispatcher<Msg> {
    sender: mpsc::UnboundedSender<Envelope<Msg>>,
}

impl<Msg> Clone for Dispatcher<Msg> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<Msg> Dispatcher<Msg> {
    /// Queue a message for the owning app
    pub fn dispatch(&self, msg: Msg) {
        if self.sender.send(Envelope::Msg(msg)).is_err() {
            tracing::debug!("app is gone, dropping message");
        }
    }

    /// Ask the owning app to stop its run loop and all subscriptions
    pub fn shutdown(&self) {
        let _ = self.sender.send(Envelope::Shutdown);
    }
}

pub(crate) struct Inbox<Msg> {
    receiver: mpsc::UnboundedReceiver<Envelope<Msg>>,
}

impl<Msg> Inbox<Msg> {
    fn try_next(&mut self) -> Option<Envelope<Msg>> {
        self.receiver.try_recv().ok()
    }

    async fn next(&mut self) -> Option<Envelope<Msg>> {
        self.receiver.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_next_message(&mut self) -> Option<Msg> {
        match self.try_next() {
            Some(Envelope::Msg(msg)) => Some(msg),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) async fn next_message(&mut self) -> Option<Msg> {
        match self.next().await {
            Some(Envelope::Msg(msg)) => Some(msg),
            _ => None,
        }
    }
}

pub(crate) fn channel<Msg>() -> (Dispatcher<Msg>, Inbox<Msg>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Dispatcher { sender }, Inbox { receiver })
}

/// A widget state machine driven by [`App`]
pub trait Program {
    /// Widget state. Must serialize to a record so its field set can be checked.
    type Model: Clone + Serialize;

    type Msg: Send + 'static;

    /// Called once by [`App::start`], typically to read host configuration
    /// and dispatch an initial message.
    fn init(&self, dispatcher: &Dispatcher<Self::Msg>);

    fn update(&self, msg: Self::Msg, model: Self::Model) -> (Self::Model, Command<Self::Msg>);

    fn view(&self, model: &Self::Model);

    /// Subscriptions desired for the given model, identified by key
    fn subscriptions(&self, _model: &Self::Model) -> Vec<Box<dyn Subscription<Self::Msg>>> {
        Vec::new()
    }
}

/// Runtime instance owning one model
pub struct App<P: Program> {
    program: P,
    model: P::Model,
    initial_fields: BTreeSet<String>,
    dispatcher: Dispatcher<P::Msg>,
    inbox: Inbox<P::Msg>,
    active: Vec<Box<dyn Subscription<P::Msg>>>,
    stopped: bool,
}

impl<P: Program> App<P> {
    /// Create an app. The field set of `initial_model` is fixed from here on.
    pub fn new(program: P, initial_model: P::Model) -> RuntimeResult<Self> {
        let initial_fields = field_names(&initial_model)?;
        let (dispatcher, inbox) = channel();
        Ok(Self {
            program,
            model: initial_model,
            initial_fields,
            dispatcher,
            inbox,
            active: Vec::new(),
            stopped: false,
        })
    }

    pub fn dispatcher(&self) -> Dispatcher<P::Msg> {
        self.dispatcher.clone()
    }

    pub fn model(&self) -> &P::Model {
        &self.model
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    /// Keys of the currently running subscriptions
    pub fn active_subscriptions(&self) -> Vec<&str> {
        self.active.iter().map(|sub| sub.key()).collect()
    }

    /// Run `init` and handle whatever it dispatched
    pub fn start(&mut self) -> RuntimeResult<()> {
        self.program.init(&self.dispatcher);
        self.process_pending()?;
        Ok(())
    }

    /// Handle one message to completion
    pub fn dispatch(&mut self, msg: P::Msg) -> RuntimeResult<()> {
        let (new_model, command) = self.program.update(msg, self.model.clone());
        self.check_shape(&new_model)?;
        self.model = new_model;
        command.run(&self.dispatcher);
        self.program.view(&self.model);
        self.refresh_subscriptions();
        Ok(())
    }

    /// Decode a `{"type": ..}` message and handle it
    pub fn dispatch_json(&mut self, value: Value) -> RuntimeResult<()>
    where
        P::Msg: DeserializeOwned,
    {
        let msg = decode_message(value)?;
        self.dispatch(msg)
    }

    /// Handle every message already queued, without waiting
    pub fn process_pending(&mut self) -> RuntimeResult<usize> {
        let mut handled = 0;
        while !self.stopped {
            match self.inbox.try_next() {
                Some(Envelope::Msg(msg)) => {
                    self.dispatch(msg)?;
                    handled += 1;
                }
                Some(Envelope::Shutdown) => self.stop(),
                None => break,
            }
        }
        Ok(handled)
    }

    /// Wait for the next queued message and handle it.
    /// Returns `false` once the app has been shut down.
    pub async fn step(&mut self) -> RuntimeResult<bool> {
        if self.stopped {
            return Ok(false);
        }
        match self.inbox.next().await {
            Some(Envelope::Msg(msg)) => {
                self.dispatch(msg)?;
                Ok(true)
            }
            Some(Envelope::Shutdown) | None => {
                self.stop();
                Ok(false)
            }
        }
    }

    /// Start the app and handle messages until [`Dispatcher::shutdown`]
    pub async fn run(&mut self) -> RuntimeResult<()> {
        self.start()?;
        while self.step().await? {}
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped = true;
        for mut sub in self.active.drain(..) {
            tracing::debug!(key = sub.key(), "stopping subscription on shutdown");
            sub.stop();
        }
    }

    fn check_shape(&self, model: &P::Model) -> RuntimeResult<()> {
        let added: Vec<String> = field_names(model)?
            .into_iter()
            .filter(|field| !self.initial_fields.contains(field))
            .collect();
        if added.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::ModelShape { fields: added })
        }
    }

    fn refresh_subscriptions(&mut self) {
        let desired = self.program.subscriptions(&self.model);
        let desired_keys: HashSet<String> =
            desired.iter().map(|sub| sub.key().to_string()).collect();

        // stop removed subs
        let mut running = Vec::with_capacity(desired.len());
        for mut sub in self.active.drain(..) {
            if desired_keys.contains(sub.key()) {
                running.push(sub);
            } else {
                tracing::debug!(key = sub.key(), "stopping subscription");
                sub.stop();
            }
        }

        // start added subs
        for mut sub in desired {
            if running.iter().any(|active| active.key() == sub.key()) {
                continue;
            }
            tracing::debug!(key = sub.key(), "starting subscription");
            sub.start(self.dispatcher.clone());
            running.push(sub);
        }

        self.active = running;
    }
}

fn field_names<M: Serialize>(model: &M) -> RuntimeResult<BTreeSet<String>> {
    match serde_json::to_value(model)? {
        Value::Object(fields) => Ok(fields.keys().cloned().collect()),
        Value::Null => Err(RuntimeError::ModelNotRecord { kind: "null" }),
        Value::Bool(_) => Err(RuntimeError::ModelNotRecord { kind: "bool" }),
        Value::Number(_) => Err(RuntimeError::ModelNotRecord { kind: "number" }),
        Value::String(_) => Err(RuntimeError::ModelNotRecord { kind: "string" }),
        Value::Array(_) => Err(RuntimeError::ModelNotRecord { kind: "array" }),
    }
}

/// Decode a tagged message, failing loudly on an unknown `type`
pub fn decode_message<Msg: DeserializeOwned>(value: Value) -> RuntimeResult<Msg> {
    let rendered = value.to_string();
    serde_json::from_value(value)
        .map_err(|e| RuntimeError::unhandled(format!("{rendered} ({e})")))
}
