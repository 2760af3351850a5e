//! Calendar widget state machine
//!
//! Fetches the events of the calendar's visible window and filters them by
//! campaign on the client.

use crate::calendar::{
    campaign_names, event_detail_url, events_endpoint, events_from_response, format_events, Event,
    FormatOptions, RawEvent, ALL_CAMPAIGNS,
};
use crate::host::{
    flag, options_from_dataset, Browser, CalendarSurface, Dataset, DomEvent, DomEventKind,
    DomEventSource, Fetcher,
};
use crate::tea::{App, Command, Dispatcher, Listen, Program, RuntimeResult, Subscription};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `name` of the campaign radio inputs rendered by the surface
pub const CAMPAIGN_INPUT_NAME: &str = "campaign_calendar_campaign_name";

/// Options read from the container's data attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarOptions {
    #[serde(default)]
    pub rest_url: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default, deserialize_with = "flag::opt_in")]
    pub filter_campaigns: bool,
    #[serde(default = "flag::enabled", deserialize_with = "flag::opt_out")]
    pub multi_day_events: bool,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            rest_url: String::new(),
            org_id: String::new(),
            filter_campaigns: false,
            multi_day_events: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarModel {
    pub events: Vec<Event>,
    /// `"All"` or a campaign name
    pub filter: String,
    pub loading: bool,
    pub options: CalendarOptions,
    /// Bumped on every visible range change; responses tagged with an older
    /// generation are dropped.
    pub generation: u64,
}

impl Default for CalendarModel {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            filter: ALL_CAMPAIGNS.to_string(),
            loading: true,
            options: CalendarOptions::default(),
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalendarMsg {
    Init {
        options: CalendarOptions,
    },
    /// Sent once the callbacks subscription is live
    Mount,
    DatesSet {
        start: NaiveDate,
        end: NaiveDate,
    },
    EventsFetched {
        #[serde(default)]
        generation: Option<u64>,
        events: Vec<RawEvent>,
    },
    EventsFetchError {
        #[serde(default)]
        generation: Option<u64>,
        error: String,
    },
    CampaignFilterChanged {
        filter: String,
    },
    OnEventClick {
        id: String,
    },
}

/// Everything the calendar needs from the embedding page
#[derive(Clone)]
pub struct CalendarHost {
    pub dataset: Dataset,
    pub fetcher: Arc<dyn Fetcher>,
    pub surface: Arc<dyn CalendarSurface>,
    pub events: Arc<dyn DomEventSource>,
    pub browser: Arc<dyn Browser>,
}

pub struct CalendarWidget {
    host: CalendarHost,
}

impl CalendarWidget {
    pub fn new(host: CalendarHost) -> Self {
        Self { host }
    }

    /// Runtime instance with a fresh model
    pub fn app(host: CalendarHost) -> RuntimeResult<App<Self>> {
        App::new(Self::new(host), CalendarModel::default())
    }

    /// Events shown for the current filter
    pub fn visible_events(model: &CalendarModel) -> impl Iterator<Item = &Event> {
        model.events.iter().filter(move |event| {
            model.filter == ALL_CAMPAIGNS
                || event.campaign_name.as_deref() == Some(model.filter.as_str())
        })
    }

    fn mount(&self) -> Command<CalendarMsg> {
        let surface = Arc::clone(&self.host.surface);
        Command::effect("MOUNT_CALENDAR", move |_| surface.mount())
    }

    fn fetch_events(
        &self,
        rest_url: &str,
        start: NaiveDate,
        end: NaiveDate,
        generation: u64,
    ) -> Command<CalendarMsg> {
        let url = events_endpoint(
            rest_url,
            &[("start", start.to_string()), ("end", end.to_string())],
        );
        let fetcher = Arc::clone(&self.host.fetcher);
        Command::perform("FETCH_EVENTS", async move {
            let generation = Some(generation);
            let result = match url {
                Ok(url) => fetcher.fetch_json(&url).await.map_err(|e| e.to_string()),
                Err(e) => Err(format!("invalid events url: {e}")),
            };
            match result {
                Ok(body) => CalendarMsg::EventsFetched {
                    generation,
                    events: events_from_response(&body),
                },
                Err(error) => CalendarMsg::EventsFetchError { generation, error },
            }
        })
    }

    fn open_event(&self, org_id: &str, id: &str) -> Command<CalendarMsg> {
        let browser = Arc::clone(&self.host.browser);
        let url = event_detail_url(org_id, id);
        Command::effect("ON_EVENT_CLICK", move |_| match url {
            Ok(url) => browser.open_in_new_tab(&url),
            Err(e) => tracing::error!("Cannot build event url: {}", e),
        })
    }
}

/// Mounting waits for one more message so the calendar callbacks are
/// subscribed before the surface reports its first visible range
fn schedule_mount() -> Command<CalendarMsg> {
    Command::effect("SCHEDULE_MOUNT", |dispatcher: &Dispatcher<CalendarMsg>| {
        dispatcher.dispatch(CalendarMsg::Mount)
    })
}

fn is_stale(generation: Option<u64>, model: &CalendarModel) -> bool {
    matches!(generation, Some(g) if g != model.generation)
}

impl Program for CalendarWidget {
    type Model = CalendarModel;
    type Msg = CalendarMsg;

    fn init(&self, dispatcher: &Dispatcher<CalendarMsg>) {
        let options = options_from_dataset(&self.host.dataset).unwrap_or_else(|e| {
            tracing::error!("Invalid calendar options, using defaults: {}", e);
            CalendarOptions::default()
        });
        dispatcher.dispatch(CalendarMsg::Init { options });
    }

    fn update(
        &self,
        msg: CalendarMsg,
        mut model: CalendarModel,
    ) -> (CalendarModel, Command<CalendarMsg>) {
        match msg {
            CalendarMsg::Init { options } => {
                model.options = options;
                (model, schedule_mount())
            }

            CalendarMsg::Mount => (model, self.mount()),

            CalendarMsg::DatesSet { start, end } => {
                model.loading = true;
                model.generation += 1;
                let command =
                    self.fetch_events(&model.options.rest_url, start, end, model.generation);
                (model, command)
            }

            CalendarMsg::EventsFetched { generation, events } => {
                if is_stale(generation, &model) {
                    tracing::debug!(?generation, current = model.generation, "Dropping stale events");
                    return (model, Command::none());
                }
                let options = FormatOptions {
                    multi_day_events: model.options.multi_day_events,
                };
                model.events = format_events(&events, options);
                if !campaign_names(&model.events).contains(&model.filter) {
                    model.filter = ALL_CAMPAIGNS.to_string();
                }
                model.loading = false;
                (model, Command::none())
            }

            CalendarMsg::EventsFetchError { generation, error } => {
                if is_stale(generation, &model) {
                    tracing::debug!(?generation, current = model.generation, "Dropping stale fetch error");
                    return (model, Command::none());
                }
                // previously fetched events stay on screen
                tracing::error!("Failed to fetch calendar events: {}", error);
                model.loading = false;
                (model, Command::none())
            }

            CalendarMsg::CampaignFilterChanged { filter } => {
                model.filter = filter;
                (model, Command::none())
            }

            CalendarMsg::OnEventClick { id } => {
                let command = self.open_event(&model.options.org_id, &id);
                (model, command)
            }
        }
    }

    fn view(&self, model: &CalendarModel) {
        let surface = &self.host.surface;
        surface.remove_all_events();
        for event in Self::visible_events(model) {
            surface.add_event(event);
        }
        surface.set_loading(model.loading);

        if model.options.filter_campaigns {
            surface.render_campaign_filters(&campaign_names(&model.events), &model.filter);
        }
    }

    fn subscriptions(&self, model: &CalendarModel) -> Vec<Box<dyn Subscription<CalendarMsg>>> {
        let mut subs = vec![Listen::new(
            "calendarCallbacks",
            Arc::clone(&self.host.events),
            &[DomEventKind::VisibleRangeChanged, DomEventKind::EventClicked],
            |event| match event {
                DomEvent::VisibleRangeChanged { start, end } => Some(CalendarMsg::DatesSet {
                    start: *start,
                    end: *end,
                }),
                DomEvent::EventClicked { id } => Some(CalendarMsg::OnEventClick { id: id.clone() }),
                _ => None,
            },
        )
        .boxed()];

        if model.options.filter_campaigns {
            subs.push(
                Listen::new(
                    "campaignFilter",
                    Arc::clone(&self.host.events),
                    &[DomEventKind::Change],
                    |event| match event {
                        DomEvent::Change { name, value } if name == CAMPAIGN_INPUT_NAME => {
                            Some(CalendarMsg::CampaignFilterChanged {
                                filter: value.clone(),
                            })
                        }
                        _ => None,
                    },
                )
                .boxed(),
            );
        }

        subs
    }
}
