//! Endpoint helpers shared by the calendar and list widgets

use crate::calendar::RawEvent;
use serde_json::Value;
use url::Url;

/// `{rest_url}/neon/events?{params}`
pub fn events_endpoint(rest_url: &str, params: &[(&str, String)]) -> Result<String, url::ParseError> {
    let mut url = Url::parse(&format!("{}/neon/events", rest_url.trim_end_matches('/')))?;
    if !params.is_empty() {
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    }
    Ok(url.into())
}

/// Public registration page of an event
pub fn event_detail_url(org_id: &str, event_id: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(&format!(
        "https://{org_id}.app.neoncrm.com/np/clients/{org_id}/event.jsp"
    ))?;
    url.query_pairs_mut().append_pair("event", event_id);
    Ok(url.into())
}

/// Pull the `events` array out of a response body. A missing array or an
/// undecodable record degrades to an empty result.
pub fn events_from_response(body: &Value) -> Vec<RawEvent> {
    let Some(events) = body.get("events") else {
        tracing::warn!("Events response has no events field: {}", body);
        return Vec::new();
    };
    match serde_json::from_value(events.clone()) {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!("Events response has an unexpected shape: {}", e);
            Vec::new()
        }
    }
}
