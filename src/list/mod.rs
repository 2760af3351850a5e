//! Paginated event list widget
//!
//! Lists upcoming events from today on, or the most recent past events. The
//! remote API only paginates forward, so reaching the latest past events takes
//! two round trips: one to learn the number of pages of the window ending
//! yesterday, one to fetch its last page.

pub mod view;

use crate::calendar::{events_endpoint, events_from_response, RawEvent};
use crate::host::{
    options_from_dataset, Clock, Container, Dataset, DomEvent, DomEventKind, DomEventSource,
    Fetcher,
};
use crate::tea::{App, Command, Dispatcher, Listen, Program, RuntimeResult, Subscription};
use chrono::{Duration, NaiveDate};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Largest page the events endpoint hands out
pub const MAX_PAGE_SIZE: u64 = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Future,
    Past,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Future => "Future",
            Direction::Past => "Past",
        }
    }

    pub fn toggled(&self) -> Direction {
        match self {
            Direction::Future => Direction::Past,
            Direction::Past => Direction::Future,
        }
    }
}

/// Options read from the container's data attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub rest_url: String,
    pub org_id: String,
    /// Case-insensitive pattern the campaign name must match
    pub campaign: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListModel {
    pub direction: Direction,
    pub error: bool,
    pub events: Vec<RawEvent>,
    pub loading: bool,
    pub options: ListOptions,
    pub total_pages: u64,
}

impl Default for ListModel {
    fn default() -> Self {
        Self {
            direction: Direction::Future,
            error: false,
            events: Vec::new(),
            loading: true,
            options: ListOptions::default(),
            total_pages: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListMsg {
    Init {
        options: ListOptions,
    },
    EventsFetchStart,
    EventsFetched {
        events: Vec<RawEvent>,
        #[serde(default, rename = "totalPages")]
        total_pages: Option<u64>,
    },
    EventsFetchError {
        error: String,
    },
    DirectionChangePast,
    DirectionChangeFuture,
    TotalPagesFetched {
        #[serde(rename = "totalPages")]
        total_pages: u64,
    },
}

/// Date window of one events request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Events from `start` on, first page
    Upcoming { start: NaiveDate },
    /// Page `page` of the events ending on `end`
    Past { end: NaiveDate, page: u64 },
}

impl Window {
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Window::Upcoming { start } => vec![("start", start.to_string())],
            Window::Past { end, page } => {
                vec![("end", end.to_string()), ("currentPage", page.to_string())]
            }
        }
    }
}

/// Number of pages needed for `total_results`
pub fn total_pages(total_results: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_results.div_ceil(page_size)
}

/// Zero-based index of the last page; `None` when there are no pages
pub fn last_page_index(total_pages: u64) -> Option<u64> {
    total_pages.checked_sub(1)
}

/// Campaign name filter compiled from [`ListOptions::campaign`]
#[derive(Debug, Clone)]
pub struct CampaignMatcher {
    regex: Option<Regex>,
}

impl CampaignMatcher {
    /// No pattern matches everything. An invalid regex is matched literally.
    pub fn new(pattern: Option<&str>) -> Self {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return Self { regex: None };
        };
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .or_else(|e| {
                tracing::warn!("Invalid campaign pattern {:?}, matching literally: {}", pattern, e);
                RegexBuilder::new(&regex::escape(pattern))
                    .case_insensitive(true)
                    .build()
            })
            .ok();
        Self { regex }
    }

    pub fn matches(&self, campaign_name: Option<&str>) -> bool {
        self.regex
            .as_ref()
            .map_or(true, |regex| regex.is_match(campaign_name.unwrap_or("")))
    }
}

/// Keep matching events, oldest first; newest first for the past direction
pub fn filter_and_sort(
    events: Vec<RawEvent>,
    campaign: Option<&str>,
    direction: Direction,
) -> Vec<RawEvent> {
    let matcher = CampaignMatcher::new(campaign);
    let mut events: Vec<RawEvent> = events
        .into_iter()
        .filter(|event| matcher.matches(event.campaign_name.as_deref()))
        .collect();
    events.sort_by(|a, b| a.start_date.cmp(&b.start_date));
    if direction == Direction::Past {
        events.reverse();
    }
    events
}

/// Everything the list needs from the embedding page
#[derive(Clone)]
pub struct ListHost {
    pub dataset: Dataset,
    pub fetcher: Arc<dyn Fetcher>,
    pub container: Arc<dyn Container>,
    pub events: Arc<dyn DomEventSource>,
    pub clock: Arc<dyn Clock>,
}

pub struct ListWidget {
    host: ListHost,
}

impl ListWidget {
    pub fn new(host: ListHost) -> Self {
        Self { host }
    }

    pub fn app(host: ListHost) -> RuntimeResult<App<Self>> {
        App::new(Self::new(host), ListModel::default())
    }

    fn yesterday(&self) -> NaiveDate {
        self.host.clock.today() - Duration::days(1)
    }

    fn fetch_upcoming(&self, rest_url: &str) -> Command<ListMsg> {
        let start = self.host.clock.today();
        self.fetch_events(rest_url, Window::Upcoming { start })
    }

    fn fetch_events(&self, rest_url: &str, window: Window) -> Command<ListMsg> {
        let url = events_endpoint(rest_url, &window.params());
        let fetcher = Arc::clone(&self.host.fetcher);
        Command::task("FETCH_EVENTS", move |dispatcher| async move {
            dispatcher.dispatch(ListMsg::EventsFetchStart);
            let result = match url {
                Ok(url) => fetcher.fetch_json(&url).await.map_err(|e| e.to_string()),
                Err(e) => Err(format!("invalid events url: {e}")),
            };
            let msg = match result {
                Ok(body) => ListMsg::EventsFetched {
                    events: events_from_response(&body),
                    total_pages: body
                        .pointer("/pagination/totalPages")
                        .and_then(Value::as_u64),
                },
                Err(error) => ListMsg::EventsFetchError { error },
            };
            dispatcher.dispatch(msg);
        })
    }

    fn get_total_pages(&self, rest_url: &str) -> Command<ListMsg> {
        let url = events_endpoint(
            rest_url,
            &[("end", self.yesterday().to_string()), ("pageSize", "1".to_string())],
        );
        let fetcher = Arc::clone(&self.host.fetcher);
        Command::perform("GET_TOTAL_PAGES", async move {
            let result = match url {
                Ok(url) => fetcher.fetch_json(&url).await.map_err(|e| e.to_string()),
                Err(e) => Err(format!("invalid events url: {e}")),
            };
            match result {
                Ok(body) => {
                    let total_results = body
                        .pointer("/pagination/totalResults")
                        .and_then(Value::as_u64)
                        .unwrap_or_else(|| {
                            tracing::warn!("Events response has no pagination.totalResults: {}", body);
                            0
                        });
                    ListMsg::TotalPagesFetched {
                        total_pages: total_pages(total_results, MAX_PAGE_SIZE),
                    }
                }
                Err(error) => ListMsg::EventsFetchError { error },
            }
        })
    }
}

impl Program for ListWidget {
    type Model = ListModel;
    type Msg = ListMsg;

    fn init(&self, dispatcher: &Dispatcher<ListMsg>) {
        let options = options_from_dataset(&self.host.dataset).unwrap_or_else(|e| {
            tracing::error!("Invalid list options, using defaults: {}", e);
            ListOptions::default()
        });
        dispatcher.dispatch(ListMsg::Init { options });
    }

    fn update(&self, msg: ListMsg, mut model: ListModel) -> (ListModel, Command<ListMsg>) {
        match msg {
            ListMsg::Init { options } => {
                let command = self.fetch_upcoming(&options.rest_url);
                model.options = options;
                (model, command)
            }

            ListMsg::EventsFetchStart => {
                model.error = false;
                model.events.clear();
                model.loading = true;
                (model, Command::none())
            }

            ListMsg::EventsFetched {
                events,
                total_pages,
            } => {
                model.events =
                    filter_and_sort(events, model.options.campaign.as_deref(), model.direction);
                model.error = false;
                model.loading = false;
                if let Some(total_pages) = total_pages {
                    model.total_pages = total_pages;
                }
                (model, Command::none())
            }

            ListMsg::EventsFetchError { error } => {
                tracing::error!("Failed to fetch list events: {}", error);
                model.error = true;
                model.events.clear();
                model.loading = false;
                (model, Command::none())
            }

            ListMsg::DirectionChangePast => {
                model.direction = Direction::Past;
                model.error = false;
                model.events.clear();
                model.loading = true;
                let command = self.get_total_pages(&model.options.rest_url);
                (model, command)
            }

            ListMsg::DirectionChangeFuture => {
                model.direction = Direction::Future;
                model.error = false;
                model.events.clear();
                model.loading = true;
                let command = self.fetch_upcoming(&model.options.rest_url);
                (model, command)
            }

            ListMsg::TotalPagesFetched { total_pages } => {
                if model.direction != Direction::Past {
                    tracing::debug!("Direction changed while counting past events, ignoring");
                    return (model, Command::none());
                }
                model.total_pages = total_pages;
                match last_page_index(total_pages) {
                    Some(page) => {
                        let window = Window::Past {
                            end: self.yesterday(),
                            page,
                        };
                        let command = self.fetch_events(&model.options.rest_url, window);
                        (model, command)
                    }
                    None => {
                        tracing::debug!("No past events, skipping page fetch");
                        model.events.clear();
                        model.loading = false;
                        (model, Command::none())
                    }
                }
            }
        }
    }

    fn view(&self, model: &ListModel) {
        self.host.container.replace_contents(&view::render(model));
    }

    fn subscriptions(&self, _model: &ListModel) -> Vec<Box<dyn Subscription<ListMsg>>> {
        vec![Listen::new(
            "directionToggle",
            Arc::clone(&self.host.events),
            &[DomEventKind::Click],
            |event| match event {
                DomEvent::Click {
                    direction: Some(direction),
                } if direction == Direction::Past.as_str() => Some(ListMsg::DirectionChangePast),
                DomEvent::Click { direction: Some(_) } => Some(ListMsg::DirectionChangeFuture),
                _ => None,
            },
        )
        .boxed()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FixedClock, LocalEventSource};
    use crate::testing::{RecordingContainer, StubFetcher};
    use serde_json::json;

    fn widget() -> ListWidget {
        ListWidget::new(ListHost {
            dataset: Dataset::new(),
            fetcher: Arc::new(StubFetcher::new()),
            container: Arc::new(RecordingContainer::new()),
            events: Arc::new(LocalEventSource::new()),
            clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2025, 8, 15).unwrap())),
        })
    }

    fn raw(id: &str, start_date: &str, campaign: Option<&str>) -> RawEvent {
        RawEvent {
            id: id.to_string(),
            start_date: Some(start_date.to_string()),
            campaign_name: campaign.map(str::to_string),
            ..RawEvent::default()
        }
    }

    fn ids(events: &[RawEvent]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(401, MAX_PAGE_SIZE), 3);
        assert_eq!(total_pages(400, MAX_PAGE_SIZE), 2);
        assert_eq!(total_pages(1, MAX_PAGE_SIZE), 1);
        assert_eq!(total_pages(0, MAX_PAGE_SIZE), 0);
        assert_eq!(last_page_index(3), Some(2));
        assert_eq!(last_page_index(0), None);
    }

    #[test]
    fn test_filter_and_sort() {
        let events = vec![
            raw("1", "2025-09-02", Some("Family Fun Days")),
            raw("2", "2025-08-20", Some("Gala")),
            raw("3", "2025-08-01", Some("FAMILY FUN nights")),
            raw("4", "2025-08-05", None),
        ];

        let future = filter_and_sort(events.clone(), Some("family fun"), Direction::Future);
        assert_eq!(ids(&future), vec!["3", "1"]);

        let past = filter_and_sort(events.clone(), Some("family fun"), Direction::Past);
        assert_eq!(ids(&past), vec!["1", "3"]);

        let all = filter_and_sort(events, None, Direction::Future);
        assert_eq!(ids(&all), vec!["3", "4", "2", "1"]);
    }

    #[test]
    fn test_invalid_pattern_matches_literally() {
        let matcher = CampaignMatcher::new(Some("fun (kids"));
        assert!(matcher.matches(Some("Fun (Kids) week")));
        assert!(!matcher.matches(Some("Fun kids")));
        assert!(!matcher.matches(None));
    }

    #[test]
    fn test_fetch_error_clears_events() {
        let model = ListModel {
            events: vec![raw("1", "2025-09-02", None)],
            loading: true,
            ..ListModel::default()
        };
        let (model, command) = widget().update(
            ListMsg::EventsFetchError {
                error: "boom".to_string(),
            },
            model,
        );
        assert!(model.error);
        assert!(model.events.is_empty());
        assert!(!model.loading);
        assert!(command.is_none());
    }

    #[test]
    fn test_direction_change_past_asks_for_total_pages() {
        let (model, command) = widget().update(ListMsg::DirectionChangePast, ListModel::default());
        assert_eq!(model.direction, Direction::Past);
        assert!(model.loading);
        assert_eq!(command.name(), "GET_TOTAL_PAGES");

        let (model, command) =
            widget().update(ListMsg::TotalPagesFetched { total_pages: 3 }, model);
        assert_eq!(model.total_pages, 3);
        assert_eq!(command.name(), "FETCH_EVENTS");
    }

    #[test]
    fn test_zero_total_pages_settles_without_fetch() {
        let model = ListModel {
            direction: Direction::Past,
            ..ListModel::default()
        };
        let (model, command) =
            widget().update(ListMsg::TotalPagesFetched { total_pages: 0 }, model);
        assert!(command.is_none());
        assert!(!model.loading);
        assert!(!model.error);
        assert!(model.events.is_empty());
    }

    #[test]
    fn test_late_total_pages_ignored_after_switching_to_future() {
        let widget = widget();
        let (model, _) = widget.update(ListMsg::DirectionChangePast, ListModel::default());
        let (model, _) = widget.update(ListMsg::DirectionChangeFuture, model);

        let (model, command) = widget.update(ListMsg::TotalPagesFetched { total_pages: 3 }, model);

        assert!(command.is_none());
        assert_eq!(model.direction, Direction::Future);
        assert_eq!(model.total_pages, 0);
        assert!(model.loading);
    }

    #[test]
    fn test_message_names() {
        let msg: ListMsg =
            serde_json::from_value(json!({ "type": "TOTAL_PAGES_FETCHED", "totalPages": 4 }))
                .unwrap();
        assert!(matches!(msg, ListMsg::TotalPagesFetched { total_pages: 4 }));

        let msg: ListMsg = serde_json::from_value(json!({ "type": "DIRECTION_CHANGE_PAST" })).unwrap();
        assert!(matches!(msg, ListMsg::DirectionChangePast));

        let msg: ListMsg =
            serde_json::from_value(json!({ "type": "EVENTS_FETCHED", "events": [] })).unwrap();
        assert!(matches!(msg, ListMsg::EventsFetched { total_pages: None, .. }));
    }

    #[test]
    fn test_model_serializes_camel_case() {
        let value = serde_json::to_value(ListModel::default()).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["direction", "error", "events", "loading", "options", "totalPages"]
        );
    }
}
