pub mod api;
pub mod event;
pub mod widget;

pub use api::{event_detail_url, events_endpoint, events_from_response};
pub use event::{campaign_names, format_events, Event, FormatOptions, RawEvent, ALL_CAMPAIGNS};
pub use widget::{
    CalendarHost, CalendarModel, CalendarMsg, CalendarOptions, CalendarWidget, CAMPAIGN_INPUT_NAME,
};
