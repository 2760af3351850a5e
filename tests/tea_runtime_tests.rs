//! Runtime contract tests: serialized transitions, model shape, subscription churn

use campaign_calendar::tea::{App, Command, Dispatcher, Program, RuntimeError, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, Serialize)]
struct Model {
    ticks: u32,
    watching: bool,
    done: bool,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum Msg {
    Tick,
    Watch,
    Unwatch,
    Work,
    WorkDone,
}

#[derive(Default)]
struct Counters {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

struct Counted {
    key: String,
    counters: Arc<Counters>,
}

impl Subscription<Msg> for Counted {
    fn key(&self) -> &str {
        &self.key
    }

    fn start(&mut self, _dispatcher: Dispatcher<Msg>) {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Harness {
    /// Every update adds an unforeseen field
    leak_field: bool,
    watcher: Arc<Counters>,
    views: Arc<Mutex<Vec<u32>>>,
}

impl Program for Harness {
    type Model = Model;
    type Msg = Msg;

    fn init(&self, dispatcher: &Dispatcher<Msg>) {
        dispatcher.dispatch(Msg::Tick);
    }

    fn update(&self, msg: Msg, mut model: Model) -> (Model, Command<Msg>) {
        if self.leak_field {
            model.extra.insert("surprise".to_string(), json!(true));
        }
        match msg {
            Msg::Tick => {
                model.ticks += 1;
                (model, Command::none())
            }
            Msg::Watch => {
                model.watching = true;
                (model, Command::none())
            }
            Msg::Unwatch => {
                model.watching = false;
                (model, Command::none())
            }
            Msg::Work => (model, Command::perform("WORK", async { Msg::WorkDone })),
            Msg::WorkDone => {
                model.done = true;
                let shutdown = Command::effect("SHUTDOWN", |d: &Dispatcher<Msg>| d.shutdown());
                (model, shutdown)
            }
        }
    }

    fn view(&self, model: &Model) {
        self.views.lock().unwrap().push(model.ticks);
    }

    fn subscriptions(&self, model: &Model) -> Vec<Box<dyn Subscription<Msg>>> {
        if model.watching {
            vec![Box::new(Counted {
                key: "watcher".to_string(),
                counters: Arc::clone(&self.watcher),
            })]
        } else {
            Vec::new()
        }
    }
}

#[test]
fn test_start_runs_init_and_view() {
    let harness = Harness::default();
    let views = Arc::clone(&harness.views);
    let mut app = App::new(harness, Model::default()).unwrap();

    app.start().unwrap();

    assert_eq!(app.model().ticks, 1);
    assert_eq!(*views.lock().unwrap(), vec![1]);
}

#[test]
fn test_continuously_desired_subscription_starts_and_stops_once() {
    let harness = Harness::default();
    let watcher = Arc::clone(&harness.watcher);
    let mut app = App::new(harness, Model::default()).unwrap();

    app.dispatch(Msg::Watch).unwrap();
    for _ in 0..5 {
        app.dispatch(Msg::Tick).unwrap();
    }
    assert_eq!(app.active_subscriptions(), vec!["watcher"]);
    assert_eq!(watcher.starts.load(Ordering::SeqCst), 1);
    assert_eq!(watcher.stops.load(Ordering::SeqCst), 0);

    app.dispatch(Msg::Unwatch).unwrap();
    app.dispatch(Msg::Tick).unwrap();
    assert!(app.active_subscriptions().is_empty());
    assert_eq!(watcher.starts.load(Ordering::SeqCst), 1);
    assert_eq!(watcher.stops.load(Ordering::SeqCst), 1);

    app.dispatch(Msg::Watch).unwrap();
    assert_eq!(watcher.starts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_extra_field_faults_for_every_message() {
    let messages = [
        json!({ "type": "TICK" }),
        json!({ "type": "WATCH" }),
        json!({ "type": "UNWATCH" }),
        json!({ "type": "WORK" }),
        json!({ "type": "WORK_DONE" }),
    ];

    for message in messages {
        let harness = Harness {
            leak_field: true,
            ..Harness::default()
        };
        let views = Arc::clone(&harness.views);
        let mut app = App::new(harness, Model::default()).unwrap();

        let err = app.dispatch_json(message.clone()).unwrap_err();
        assert!(
            matches!(&err, RuntimeError::ModelShape { fields } if fields == &["surprise".to_string()]),
            "{message}: {err}"
        );
        assert!(err.to_string().contains("surprise"));
        // nothing committed, nothing rendered
        assert_eq!(app.model().ticks, 0);
        assert!(views.lock().unwrap().is_empty());
    }
}

#[test]
fn test_unknown_message_type_is_fatal() {
    let mut app = App::new(Harness::default(), Model::default()).unwrap();

    let err = app.dispatch_json(json!({ "type": "REWIND" })).unwrap_err();

    assert!(matches!(err, RuntimeError::UnhandledMessage { .. }));
    assert!(err.to_string().contains("REWIND"));
}

#[tokio::test]
async fn test_async_command_dispatches_after_current_message() {
    let mut app = App::new(Harness::default(), Model::default()).unwrap();
    app.start().unwrap();

    app.dispatch(Msg::Work).unwrap();
    // the continuation has not run yet
    assert!(!app.model().done);

    assert!(app.step().await.unwrap());
    assert!(app.model().done);
    // WORK_DONE asked for shutdown
    assert!(!app.step().await.unwrap());
}

#[tokio::test]
async fn test_run_until_shutdown() {
    struct Worker;

    impl Program for Worker {
        type Model = Model;
        type Msg = Msg;

        fn init(&self, dispatcher: &Dispatcher<Msg>) {
            dispatcher.dispatch(Msg::Work);
        }

        fn update(&self, msg: Msg, model: Model) -> (Model, Command<Msg>) {
            Harness::default().update(msg, model)
        }

        fn view(&self, _model: &Model) {}
    }

    let mut app = App::new(Worker, Model::default()).unwrap();
    app.run().await.unwrap();
    assert!(app.model().done);
}
