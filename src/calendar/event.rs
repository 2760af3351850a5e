//! Event projection: upstream event records into normalized calendar events

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Filter value matching every event
pub const ALL_CAMPAIGNS: &str = "All";

/// Event record as returned by the events endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub start_time: Option<String>,
    pub end_date: Option<String>,
    pub end_time: Option<String>,
    pub campaign_name: Option<String>,
    #[serde(alias = "categoryName")]
    pub category: Option<String>,
}

/// Normalized calendar event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Derived: start and end fall on different dates
    pub all_day: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// When false every event is displayed on its start date only
    pub multi_day_events: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            multi_day_events: true,
        }
    }
}

/// Project raw records into events. Records without a usable start date are
/// skipped; missing optional fields never fail the projection.
pub fn format_events(raw_events: &[RawEvent], options: FormatOptions) -> Vec<Event> {
    raw_events
        .iter()
        .filter_map(|raw| format_event(raw, options))
        .collect()
}

fn format_event(raw: &RawEvent, options: FormatOptions) -> Option<Event> {
    let Some(start_date) = raw.start_date.as_deref().and_then(parse_date) else {
        tracing::warn!(id = %raw.id, "Skipping event without a valid start date");
        return None;
    };
    let mut end_date = raw
        .end_date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or(start_date);
    if !options.multi_day_events {
        end_date = start_date;
    }

    let start = start_date.and_time(parse_time(raw.start_time.as_deref()));
    let end = end_date.and_time(parse_time(raw.end_time.as_deref()));

    Some(Event {
        id: raw.id.clone(),
        title: raw.name.clone().unwrap_or_default(),
        start,
        end,
        start_date,
        end_date,
        campaign_name: raw.campaign_name.clone(),
        category: raw.category.clone(),
        all_day: start_date != end_date,
    })
}

/// Distinct campaign names, sorted, with the "All" sentinel first
pub fn campaign_names(events: &[Event]) -> Vec<String> {
    let names: BTreeSet<&str> = events
        .iter()
        .filter_map(|event| event.campaign_name.as_deref())
        .filter(|name| !name.is_empty() && *name != ALL_CAMPAIGNS)
        .collect();

    std::iter::once(ALL_CAMPAIGNS)
        .chain(names)
        .map(str::to_string)
        .collect()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

fn parse_time(value: Option<&str>) -> NaiveTime {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return NaiveTime::MIN;
    };
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .unwrap_or_else(|_| {
            tracing::warn!("Unparseable event time {:?}, using midnight", value);
            NaiveTime::MIN
        })
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}
