pub mod calendar;
pub mod cli;
pub mod config;
pub mod host;
pub mod list;
pub mod proxy;
pub mod server;
pub mod tea;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use calendar::{CalendarHost, CalendarWidget};
pub use config::ProxyConfig;
pub use list::{ListHost, ListWidget};
pub use proxy::{CacheAsideProxy, ProxyError};
pub use tea::{App, Command, Dispatcher, Program, RuntimeError};
