use std::fs;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jobwatch::EventKind;
use jobwatch::observer::{Monitor, MonitorSettings, TerminalPolicy};
use jobwatch::remote::JulesClient;
use jobwatch::tailer::{Delivery, EventHandler, EventTailer, LoggedEvent, TailerSettings};

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<(EventKind, Option<String>)>>,
}

impl EventHandler for Recorder {
    async fn handle(&self, event: &LoggedEvent) -> Delivery {
        self.seen
            .lock()
            .unwrap()
            .push((event.kind, event.job_id.clone()));
        Delivery::Handled
    }
}

fn monitor_settings(dir: &TempDir) -> MonitorSettings {
    MonitorSettings {
        jobs_path: dir.path().join("jobs.jsonl"),
        events_path: dir.path().join("events.jsonl"),
        state_path: dir.path().join("monitor_state.json"),
        poll_interval: Duration::from_secs(45),
        stuck_threshold: TimeDelta::minutes(20),
        terminal_policy: TerminalPolicy::OnTransition,
    }
}

fn tailer_settings(dir: &TempDir) -> TailerSettings {
    TailerSettings {
        events_path: dir.path().join("events.jsonl"),
        state_path: dir.path().join("watcher_state.json"),
        poll_interval: Duration::from_millis(10),
    }
}

async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

#[tokio::test]
async fn events_flow_from_remote_status_to_handler() {
    let server = MockServer::start().await;
    mount_json(&server, "/v1/jobs/J1", json!({"status": "RUNNING"}), Some(1)).await;
    mount_json(&server, "/v1/jobs/J1", json!({"status": "COMPLETED"}), None).await;
    mount_json(&server, "/v1/jobs/J1/messages", json!({"messages": []}), None).await;
    mount_json(&server, "/v1/jobs/J2", json!({"status": "RUNNING"}), None).await;
    mount_json(
        &server,
        "/v1/jobs/J2/messages",
        json!({"messages": [], "next_cursor": "c-1"}),
        None,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    jobwatch::jobs::register_job(&dir.path().join("jobs.jsonl"), "J1", None).unwrap();
    jobwatch::jobs::register_job(&dir.path().join("jobs.jsonl"), "J2", None).unwrap();

    let client = JulesClient::with_base_url(
        format!("{}/v1", server.uri()),
        None,
        Duration::from_secs(5),
    )
    .unwrap();
    let mut monitor = Monitor::new(client, monitor_settings(&dir)).unwrap();

    let t0 = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
    monitor.cycle(t0).await;
    monitor.cycle(t0 + TimeDelta::minutes(25)).await;
    monitor.cycle(t0 + TimeDelta::minutes(30)).await;

    let mut tailer = EventTailer::new(Recorder::default(), tailer_settings(&dir)).unwrap();
    let report = tailer.drain().await.unwrap();
    assert_eq!(report.delivered, 2);

    let seen = tailer.handler().seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (EventKind::Completed, Some("J1".to_string())),
            (EventKind::Stuck, Some("J2".to_string())),
        ]
    );

    // A restarted watcher has nothing left to deliver.
    let mut restarted = EventTailer::new(Recorder::default(), tailer_settings(&dir)).unwrap();
    assert_eq!(restarted.drain().await.unwrap().delivered, 0);

    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("monitor_state.json")).unwrap())
            .unwrap();
    assert_eq!(state["J1"]["last_status"], "COMPLETED");
    assert_eq!(state["J2"]["cursor"], "c-1");
}

#[tokio::test]
async fn unreachable_api_produces_error_events_without_stopping() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("jobs.jsonl"), "\"J1\"\n\"J2\"\n").unwrap();

    let client =
        JulesClient::with_base_url("http://127.0.0.1:9".into(), None, Duration::from_millis(500))
            .unwrap();
    let mut monitor = Monitor::new(client, monitor_settings(&dir)).unwrap();
    let t0 = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
    monitor.cycle(t0).await;
    monitor.cycle(t0 + TimeDelta::minutes(1)).await;

    let mut tailer = EventTailer::new(Recorder::default(), tailer_settings(&dir)).unwrap();
    tailer.drain().await.unwrap();
    let seen = tailer.handler().seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|(kind, _)| *kind == EventKind::Error));
}
