//! Host capabilities consumed by the widgets
//!
//! The widgets never talk to a browser directly. Everything they need from
//! the embedding page is one of the traits below, so the same state machines
//! run against a real page, a desktop shell or a test double.

pub mod dom;
pub mod fetch;

pub use dom::{DomEvent, DomEventKind, DomEventSource, Listener, ListenerId, LocalEventSource};
pub use fetch::{FetchError, Fetcher, HttpFetcher};

use crate::calendar::Event;
use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// `data-*` attributes of the widget's container element
pub type Dataset = HashMap<String, String>;

/// Decode widget options from a dataset
pub fn options_from_dataset<T: DeserializeOwned>(dataset: &Dataset) -> serde_json::Result<T> {
    serde_json::to_value(dataset).and_then(serde_json::from_value)
}

/// The mounted calendar library instance
pub trait CalendarSurface: Send + Sync {
    /// Render the calendar into its element. Afterwards the surface reports
    /// visible range changes and clicks as [`DomEvent`]s.
    fn mount(&self);

    fn remove_all_events(&self);

    fn add_event(&self, event: &Event);

    fn set_loading(&self, loading: bool);

    /// Render one radio button per campaign name, `selected` checked
    fn render_campaign_filters(&self, names: &[String], selected: &str);
}

/// An element whose contents are replaced wholesale on each render
pub trait Container: Send + Sync {
    fn replace_contents(&self, html: &str);
}

pub trait Browser: Send + Sync {
    fn open_in_new_tab(&self, url: &str);
}

/// Opens links with the system's default browser
pub struct SystemBrowser;

impl Browser for SystemBrowser {
    fn open_in_new_tab(&self, url: &str) {
        if let Err(e) = webbrowser::open(url) {
            tracing::error!("Failed to open {}: {}", url, e);
        }
    }
}

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to one date
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Boolean dataset flags arrive as `"true"` / `"false"` strings
pub mod flag {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    /// On only for `true` / `"true"`
    pub fn opt_in<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => value,
            Raw::Text(text) => text == "true",
        })
    }

    /// Off only for `false` / `"false"`
    pub fn opt_out<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(value) => value,
            Raw::Text(text) => text != "false",
        })
    }

    pub fn enabled() -> bool {
        true
    }
}
