//! List widget driven through the runtime, including the two-step past pagination

use campaign_calendar::host::{Dataset, DomEvent, FetchError, FixedClock, LocalEventSource};
use campaign_calendar::list::{Direction, ListHost, ListWidget};
use campaign_calendar::testing::{RecordingContainer, StubFetcher};
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;

const EVENTS_URL: &str = "https://example.org/api/neon/events";

struct Page {
    fetcher: Arc<StubFetcher>,
    container: Arc<RecordingContainer>,
    events: Arc<LocalEventSource>,
    host: ListHost,
}

fn page(campaign: Option<&str>) -> Page {
    let mut dataset = Dataset::new();
    dataset.insert("rest_url".to_string(), "https://example.org/api".to_string());
    dataset.insert("org_id".to_string(), "acme".to_string());
    if let Some(campaign) = campaign {
        dataset.insert("campaign".to_string(), campaign.to_string());
    }

    let fetcher = Arc::new(StubFetcher::new());
    let container = Arc::new(RecordingContainer::new());
    let events = Arc::new(LocalEventSource::new());
    let host = ListHost {
        dataset,
        fetcher: fetcher.clone(),
        container: container.clone(),
        events: events.clone(),
        clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 8, 15).unwrap())),
    };
    Page {
        fetcher,
        container,
        events,
        host,
    }
}

fn click(direction: &str) -> DomEvent {
    DomEvent::Click {
        direction: Some(direction.to_string()),
    }
}

#[tokio::test]
async fn test_init_fetches_upcoming_events() {
    let page = page(Some("family fun"));
    page.fetcher.push_ok(json!({
        "events": [
            { "id": 1, "name": "Gala", "startDate": "2025-08-20", "campaignName": "Fundraising" },
            { "id": 2, "name": "Pond dip", "startDate": "2025-09-01", "campaignName": "Family Fun" },
            { "id": 3, "name": "Bug hunt", "startDate": "2025-08-18", "campaignName": "FAMILY FUN" }
        ],
        "pagination": { "totalPages": 1, "totalResults": 3 }
    }));
    let mut app = ListWidget::app(page.host.clone()).unwrap();

    app.start().unwrap();
    assert!(app.model().loading);
    // EVENTS_FETCH_START, then EVENTS_FETCHED
    app.step().await.unwrap();
    app.step().await.unwrap();

    assert_eq!(page.fetcher.requests(), vec![format!("{EVENTS_URL}?start=2025-08-15")]);
    let ids: Vec<&str> = app.model().events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "2"]);
    assert_eq!(app.model().total_pages, 1);
    assert!(!app.model().loading);

    let html = page.container.last().unwrap();
    assert!(html.contains("<h2>Future Events</h2>"));
    assert!(html.contains(&ammonia::clean_text("Bug hunt")));
    assert!(!html.contains("Gala"));
}

#[tokio::test]
async fn test_past_direction_requests_last_page() {
    let page = page(None);
    page.fetcher.push_ok(json!({ "events": [], "pagination": { "totalPages": 0 } }));
    page.fetcher.push_ok(json!({ "events": [], "pagination": { "totalResults": 401 } }));
    page.fetcher.push_ok(json!({
        "events": [
            { "id": 7, "startDate": "2025-07-01" },
            { "id": 8, "startDate": "2025-08-10" }
        ],
        "pagination": { "totalPages": 3 }
    }));
    let mut app = ListWidget::app(page.host.clone()).unwrap();
    app.start().unwrap();
    app.step().await.unwrap();
    app.step().await.unwrap();

    page.events.emit(&click("Past"));
    app.process_pending().unwrap();
    assert_eq!(app.model().direction, Direction::Past);
    assert!(app.model().loading);

    // TOTAL_PAGES_FETCHED
    app.step().await.unwrap();
    assert_eq!(app.model().total_pages, 3);
    // EVENTS_FETCH_START, EVENTS_FETCHED
    app.step().await.unwrap();
    app.step().await.unwrap();

    assert_eq!(
        page.fetcher.requests()[1..],
        [
            format!("{EVENTS_URL}?end=2025-08-14&pageSize=1"),
            format!("{EVENTS_URL}?end=2025-08-14&currentPage=2"),
        ]
    );
    let ids: Vec<&str> = app.model().events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["8", "7"]);
    let html = page.container.last().unwrap();
    assert!(html.contains("<h2>Past Events</h2>"));
    assert!(html.contains(r#"data-direction="Future""#));
}

#[tokio::test]
async fn test_past_direction_without_results_skips_page_fetch() {
    let page = page(None);
    page.fetcher.push_ok(json!({ "events": [] }));
    page.fetcher.push_ok(json!({ "pagination": { "totalResults": 0 } }));
    let mut app = ListWidget::app(page.host.clone()).unwrap();
    app.start().unwrap();
    app.step().await.unwrap();
    app.step().await.unwrap();

    page.events.emit(&click("Past"));
    app.process_pending().unwrap();
    app.step().await.unwrap();
    app.process_pending().unwrap();

    assert_eq!(app.model().total_pages, 0);
    assert!(!app.model().loading);
    assert!(!app.model().error);
    assert_eq!(page.fetcher.requests().len(), 2);
    assert!(page.container.last().unwrap().contains("No events found."));
}

#[tokio::test]
async fn test_fetch_error_shows_banner() {
    let page = page(None);
    page.fetcher.push_err(FetchError::Transport("connection reset".to_string()));
    let mut app = ListWidget::app(page.host.clone()).unwrap();

    app.start().unwrap();
    app.step().await.unwrap();
    app.step().await.unwrap();

    assert!(app.model().error);
    assert!(app.model().events.is_empty());
    assert!(!app.model().loading);
    let html = page.container.last().unwrap();
    assert!(html.contains("Something went wrong."));
    assert!(!html.contains("No events found."));
}

#[tokio::test]
async fn test_toggle_back_to_future() {
    let page = page(None);
    page.fetcher.push_ok(json!({ "events": [] }));
    page.fetcher.push_ok(json!({ "pagination": { "totalResults": 0 } }));
    page.fetcher.push_ok(json!({ "events": [] }));
    let mut app = ListWidget::app(page.host.clone()).unwrap();
    app.start().unwrap();
    app.step().await.unwrap();
    app.step().await.unwrap();
    page.events.emit(&click("Past"));
    app.process_pending().unwrap();
    app.step().await.unwrap();

    page.events.emit(&click("Future"));
    app.process_pending().unwrap();
    app.step().await.unwrap();
    app.step().await.unwrap();

    assert_eq!(app.model().direction, Direction::Future);
    assert_eq!(
        page.fetcher.requests().last().cloned(),
        Some(format!("{EVENTS_URL}?start=2025-08-15"))
    );
    assert_eq!(app.active_subscriptions(), vec!["directionToggle"]);
}

#[tokio::test]
async fn test_clicks_without_direction_are_ignored() {
    let page = page(None);
    page.fetcher.push_ok(json!({ "events": [] }));
    let mut app = ListWidget::app(page.host.clone()).unwrap();
    app.start().unwrap();
    app.step().await.unwrap();
    app.step().await.unwrap();
    let renders = page.container.render_count();

    page.events.emit(&DomEvent::Click { direction: None });

    assert_eq!(app.process_pending().unwrap(), 0);
    assert_eq!(page.container.render_count(), renders);
}
