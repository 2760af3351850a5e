//! Command system for the runtime
//!
//! Commands represent side effects scheduled by `update`. They run right after
//! the new model is committed and may dispatch follow-up messages, either
//! synchronously (effects) or later from a spawned task.

use crate::tea::Dispatcher;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;

type Effect<Msg> = Box<dyn FnOnce(&Dispatcher<Msg>) + Send>;
type Task<Msg> = Box<dyn FnOnce(Dispatcher<Msg>) -> BoxFuture<'static, ()> + Send>;

/// A named, deferred unit of work
pub struct Command<Msg> {
    name: String,
    kind: CommandKind<Msg>,
}

enum CommandKind<Msg> {
    /// No operation - used when no side effects are needed
    None,

    /// Synchronous side effect (open a link, mount a widget)
    Effect(Effect<Msg>),

    /// Asynchronous work spawned on the ambient tokio runtime
    Task(Task<Msg>),

    /// Batch multiple commands
    Batch(Vec<Command<Msg>>),
}

impl<Msg: Send + 'static> Command<Msg> {
    /// Create a no-op command
    pub fn none() -> Self {
        Self {
            name: "NONE".to_string(),
            kind: CommandKind::None,
        }
    }

    /// Create a synchronous command
    pub fn effect<F>(name: impl Into<String>, effect: F) -> Self
    where
        F: FnOnce(&Dispatcher<Msg>) + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: CommandKind::Effect(Box::new(effect)),
        }
    }

    /// Create an asynchronous command that owns a dispatcher for its continuation
    pub fn task<F, Fut>(name: impl Into<String>, task: F) -> Self
    where
        F: FnOnce(Dispatcher<Msg>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: CommandKind::Task(Box::new(move |dispatcher| Box::pin(task(dispatcher)))),
        }
    }

    /// Create an asynchronous command whose output is dispatched as a message
    pub fn perform<Fut>(name: impl Into<String>, future: Fut) -> Self
    where
        Fut: Future<Output = Msg> + Send + 'static,
    {
        Self::task(name, move |dispatcher| async move {
            dispatcher.dispatch(future.await);
        })
    }

    /// Create a batch of commands, run in order
    pub fn batch(commands: Vec<Command<Msg>>) -> Self {
        Self {
            name: "BATCH".to_string(),
            kind: CommandKind::Batch(commands),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_none(&self) -> bool {
        matches!(self.kind, CommandKind::None)
    }

    /// Execute the command. Asynchronous work is spawned and not awaited.
    pub fn run(self, dispatcher: &Dispatcher<Msg>) {
        let Command { name, kind } = self;
        match kind {
            CommandKind::None => {}
            CommandKind::Effect(effect) => {
                tracing::debug!(command = %name, "running effect");
                effect(dispatcher);
            }
            CommandKind::Task(task) => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    tracing::debug!(command = %name, "spawning task");
                    handle.spawn(task(dispatcher.clone()));
                }
                Err(e) => {
                    tracing::error!(command = %name, "no async runtime to run task: {}", e);
                }
            },
            CommandKind::Batch(commands) => {
                for command in commands {
                    command.run(dispatcher);
                }
            }
        }
    }
}

impl<Msg> fmt::Debug for Command<Msg> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish()
    }
}
