//! The Elm Architecture (TEA) runtime shared by the widgets
//!
//! A program supplies `init`, `update`, `view` and `subscriptions`; the
//! runtime owns the model, runs the commands `update` returns and keeps the
//! set of running subscriptions in line with what the model asks for.

pub mod command;
pub mod error;
pub mod runtime;
pub mod subscription;

pub use command::Command;
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{decode_message, App, Dispatcher, Program};
pub use subscription::{Listen, Subscription};
