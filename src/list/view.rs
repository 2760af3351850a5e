//! HTML rendering of the list widget

use crate::calendar::{event_detail_url, RawEvent};
use crate::list::ListModel;
use ammonia::clean_text;
use chrono::NaiveDate;
use std::fmt::Write;

const PREFIX: &str = "campaign_calendar_list";

/// Full contents of the list container for `model`
pub fn render(model: &ListModel) -> String {
    let mut html = String::new();
    render_header(&mut html, model);
    if model.error {
        html.push_str("<div>Something went wrong.</div>");
    }
    render_events(&mut html, model);
    if model.loading {
        let _ = write!(html, r#"<div class="{PREFIX}_loading"></div>"#);
    }
    html
}

fn render_header(html: &mut String, model: &ListModel) {
    let next = model.direction.toggled().as_str();
    let _ = write!(
        html,
        r#"<div class="{PREFIX}_header"><h2>{} Events</h2><button class="{PREFIX}_change_direction" data-direction="{next}">{next}</button></div>"#,
        model.direction.as_str(),
    );
}

fn render_events(html: &mut String, model: &ListModel) {
    if !model.loading && !model.error && model.events.is_empty() {
        html.push_str("<div>No events found.</div>");
        return;
    }
    html.push_str("<div>");
    for event in &model.events {
        render_event(html, &model.options.org_id, event);
    }
    html.push_str("</div>");
}

fn render_event(html: &mut String, org_id: &str, event: &RawEvent) {
    let href = event_detail_url(org_id, &event.id).unwrap_or_else(|e| {
        tracing::warn!("Cannot build event url for {}: {}", event.id, e);
        "#".to_string()
    });
    let (day, month, year) = event
        .start_date
        .as_deref()
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
        .map(|date| {
            (
                date.format("%d").to_string(),
                date.format("%b").to_string(),
                date.format("%y").to_string(),
            )
        })
        .unwrap_or_default();

    let _ = write!(
        html,
        concat!(
            r#"<a href="{href}" class="{prefix}_event" target="_blank">"#,
            r#"<div class="{prefix}_event_date">"#,
            r#"<div class="{prefix}_event_date_day">{day}</div>"#,
            r#"<div class="{prefix}_event_date_month_year">{month}, {year}</div>"#,
            r#"</div>"#,
            r#"<div class="{prefix}_event_details">"#,
            r#"<div class="{prefix}_event_campaign_name">{campaign}</div>"#,
            r#"<h5 class="{prefix}_event_name">{name}</h5>"#,
            r#"</div>"#,
            r#"<div class="{prefix}_event_cta"><span>&rsaquo;</span></div>"#,
            r#"</a>"#,
        ),
        href = clean_text(&href),
        prefix = PREFIX,
        day = day,
        month = month,
        year = year,
        campaign = clean_text(event.campaign_name.as_deref().unwrap_or_default()),
        name = clean_text(event.name.as_deref().unwrap_or_default()),
    );
}
