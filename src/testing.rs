//! Recording test doubles for the host capabilities and the proxy upstream
//!
//! Used by the crate's own tests and handy for embedders testing their wiring.

use crate::calendar::Event;
use crate::host::{Browser, CalendarSurface, Container, FetchError, Fetcher};
use crate::proxy::{ProxyError, ProxyResult, Upstream, UpstreamRequest, UpstreamResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Mount,
    RemoveAll,
    Add(String),
    Loading(bool),
    CampaignFilters { names: Vec<String>, selected: String },
}

/// Calendar surface that records every call
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: SurfaceCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn mount_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == SurfaceCall::Mount)
            .count()
    }

    /// Ids added since the last `remove_all_events`
    pub fn displayed_ids(&self) -> Vec<String> {
        let calls = self.calls();
        let since = calls
            .iter()
            .rposition(|call| *call == SurfaceCall::RemoveAll)
            .map_or(0, |i| i + 1);
        calls[since..]
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Add(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_loading(&self) -> Option<bool> {
        self.calls().iter().rev().find_map(|call| match call {
            SurfaceCall::Loading(loading) => Some(*loading),
            _ => None,
        })
    }

    pub fn last_campaign_filters(&self) -> Option<(Vec<String>, String)> {
        self.calls().into_iter().rev().find_map(|call| match call {
            SurfaceCall::CampaignFilters { names, selected } => Some((names, selected)),
            _ => None,
        })
    }
}

impl CalendarSurface for RecordingSurface {
    fn mount(&self) {
        self.record(SurfaceCall::Mount);
    }

    fn remove_all_events(&self) {
        self.record(SurfaceCall::RemoveAll);
    }

    fn add_event(&self, event: &Event) {
        self.record(SurfaceCall::Add(event.id.clone()));
    }

    fn set_loading(&self, loading: bool) {
        self.record(SurfaceCall::Loading(loading));
    }

    fn render_campaign_filters(&self, names: &[String], selected: &str) {
        self.record(SurfaceCall::CampaignFilters {
            names: names.to_vec(),
            selected: selected.to_string(),
        });
    }
}

/// Container keeping every rendered document
#[derive(Default)]
pub struct RecordingContainer {
    renders: Mutex<Vec<String>>,
}

impl RecordingContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.renders.lock().ok().and_then(|r| r.last().cloned())
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Container for RecordingContainer {
    fn replace_contents(&self, html: &str) {
        if let Ok(mut renders) = self.renders.lock() {
            renders.push(html.to_string());
        }
    }
}

#[derive(Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl Browser for RecordingBrowser {
    fn open_in_new_tab(&self, url: &str) {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(url.to_string());
        }
    }
}

/// Fetcher answering from a queue of scripted responses, in order
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<VecDeque<Result<Value, FetchError>>>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, body: Value) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Ok(body));
        }
    }

    pub fn push_err(&self, error: FetchError) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(Err(error));
        }
    }

    /// Urls requested so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front())
            .unwrap_or_else(|| Err(FetchError::Transport("no scripted response".to_string())))
    }
}

/// Upstream answering every request with the same scripted outcome
pub struct ScriptedUpstream {
    outcome: Mutex<ProxyResult<UpstreamResponse>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedUpstream {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            outcome: Mutex::new(Ok(UpstreamResponse {
                status,
                body: body.into(),
            })),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Upstream that cannot be reached
    pub fn unreachable(message: impl Into<String>) -> Self {
        let upstream = Self::new(200, "");
        upstream.fail(message);
        upstream
    }

    pub fn respond(&self, status: u16, body: impl Into<String>) {
        if let Ok(mut outcome) = self.outcome.lock() {
            *outcome = Ok(UpstreamResponse {
                status,
                body: body.into(),
            });
        }
    }

    pub fn fail(&self, message: impl Into<String>) {
        if let Ok(mut outcome) = self.outcome.lock() {
            *outcome = Err(ProxyError::transport(message));
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn send(&self, request: &UpstreamRequest) -> ProxyResult<UpstreamResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match self.outcome.lock() {
            Ok(outcome) => outcome.clone(),
            Err(_) => Err(ProxyError::transport("scripted upstream poisoned")),
        }
    }
}
