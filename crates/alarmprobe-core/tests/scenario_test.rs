#![allow(clippy::unwrap_used)]
// End-to-end scenario tests: wiremock stands in for the REST gateway and an
// in-memory feed stands in for the broker.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alarmprobe_core::{
    AlarmCheck, AlarmFeed, CoreError, MessageSource, RestClient, Scenario, ScenarioConfig, Stage,
    SubscribeOptions, TlsMode, check_topic, list_topics,
};

// ── Fake feed ───────────────────────────────────────────────────────

struct QueueSource {
    queue: VecDeque<Vec<u8>>,
}

impl MessageSource for QueueSource {
    fn next_message(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, CoreError>> + Send {
        let next = self.queue.pop_front();
        async move { Ok(next) }
    }
}

#[derive(Clone, Default)]
struct FakeFeed {
    topics: Vec<String>,
    messages: Vec<Value>,
    opened: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<usize>>,
    /// Never answer metadata or subscribe requests.
    unresponsive: bool,
}

impl FakeFeed {
    fn with_messages(messages: Vec<Value>) -> Self {
        Self {
            topics: vec!["voltha.alarms".into()],
            messages,
            ..Self::default()
        }
    }

    fn unresponsive() -> Self {
        Self {
            unresponsive: true,
            ..Self::with_messages(vec![])
        }
    }
}

async fn hang_if(unresponsive: bool) {
    if unresponsive {
        std::future::pending::<()>().await;
    }
}

impl AlarmFeed for FakeFeed {
    type Source = QueueSource;

    fn describe(&self) -> String {
        "fake-broker:9092".into()
    }

    fn topics(&self) -> impl Future<Output = Result<Vec<String>, CoreError>> + Send {
        let topics = self.topics.clone();
        let unresponsive = self.unresponsive;
        async move {
            hang_if(unresponsive).await;
            Ok(topics)
        }
    }

    fn open(
        &self,
        topic: &str,
        _options: &SubscribeOptions,
    ) -> impl Future<Output = Result<Self::Source, CoreError>> + Send {
        self.opened.lock().unwrap().push(topic.to_owned());
        let queue = self
            .messages
            .iter()
            .map(|m| serde_json::to_vec(m).unwrap())
            .collect();
        let unresponsive = self.unresponsive;
        async move {
            hang_if(unresponsive).await;
            Ok(QueueSource { queue })
        }
    }

    fn close(&self, source: Self::Source) {
        drop(source);
        *self.closed.lock().unwrap() += 1;
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn alarm_for(device_id: &str) -> Value {
    json!({
        "id": format!("voltha.simulated_olt.{device_id}"),
        "type": "COMMUNICATION",
        "category": "OLT",
        "state": "RAISED",
        "severity": "MAJOR",
        "resource_id": device_id,
        "raised_ts": 1_500_000_000.0,
        "reported_ts": 1_500_000_001.0,
        "changed_ts": 0,
        "description": "simulated alarm",
        "context": { "pon": "1" }
    })
}

fn config(server: &MockServer, cleanup: bool) -> ScenarioConfig {
    ScenarioConfig {
        rest_base_url: Url::parse(&server.uri()).unwrap(),
        broker_endpoint: "fake-broker:9092".into(),
        alarms: AlarmCheck {
            timeout: Duration::from_secs(2),
            ..AlarmCheck::default()
        },
        http_timeout: Duration::from_secs(5),
        tls: TlsMode::System,
        cleanup,
    }
}

async fn mount_gateway(server: &MockServer, admin_state_after_activate: &str) {
    Mock::given(method("GET"))
        .and(path("/api/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/local/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc123",
            "type": "simulated_olt",
            "admin_state": "DISABLED"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/local/devices/abc123/activate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/local/devices/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "abc123",
            "type": "simulated_olt",
            "admin_state": admin_state_after_activate
        })))
        .mount(server)
        .await;
}

fn scenario(server: &MockServer, feed: FakeFeed, cleanup: bool) -> Scenario<FakeFeed> {
    let config = config(server, cleanup);
    let rest = RestClient::from_reqwest(config.rest_base_url.clone(), reqwest::Client::new());
    Scenario::new(config, rest, feed)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_scenario_passes() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;

    let feed = FakeFeed::with_messages(vec![
        alarm_for("zzz999"),
        json!({"id": "voltha.simulated_olt.abc123"}),
        alarm_for("abc123"),
    ]);
    let closed = feed.closed.clone();
    let opened = feed.opened.clone();

    let report = scenario(&server, feed, false)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.device.id, "abc123");
    assert_eq!(report.alarm, alarm_for("abc123"));
    assert_eq!(report.alarm_id, "voltha.simulated_olt.abc123");
    assert_eq!(report.scanned, 3);
    assert!(report.cleanup.is_none());

    let stages: Vec<Stage> = report.stages.iter().map(|t| t.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Init,
            Stage::RestAvailabilityChecked,
            Stage::DeviceCreated,
            Stage::DeviceActivated,
            Stage::AlarmObserved,
            Stage::SchemaValidated,
            Stage::IdentifierValidated,
            Stage::Done,
        ]
    );

    assert_eq!(*opened.lock().unwrap(), vec!["voltha.alarms".to_string()]);
    assert_eq!(*closed.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_rest_unavailable_fails_first_stage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let failure = scenario(&server, FakeFeed::default(), false)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::RestAvailabilityChecked);
    assert!(matches!(
        failure.error,
        CoreError::UnexpectedStatus { expected: 200, actual: 503, .. }
    ));
    assert!(failure.device_id.is_none());
}

#[tokio::test]
async fn test_device_not_enabled_fails_activation() {
    let server = MockServer::start().await;
    mount_gateway(&server, "DISABLED").await;

    let failure = scenario(&server, FakeFeed::with_messages(vec![]), false)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::DeviceActivated);
    assert!(matches!(failure.error, CoreError::AdminState { .. }));
    assert_eq!(failure.device_id.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_alarm_for_other_device_is_not_found() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;

    let feed = FakeFeed::with_messages(vec![alarm_for("zzz999")]);
    let closed = feed.closed.clone();

    let failure = scenario(&server, feed, false)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::AlarmObserved);
    assert_eq!(
        failure.error.to_string(),
        "Failed to find kafka alarm with device id:abc123"
    );
    // The subscription is released on the failure path too.
    assert_eq!(*closed.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_schema_violation_names_field() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;

    let mut alarm = alarm_for("abc123");
    alarm["context"] = json!({ "k": 5 });

    let failure = scenario(&server, FakeFeed::with_messages(vec![alarm]), false)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::SchemaValidated);
    match failure.error {
        CoreError::Schema(violation) => {
            assert_eq!(violation.fields().collect::<Vec<_>>(), vec!["context"]);
        }
        other => panic!("expected Schema, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_producer_fails_identifier_stage() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;

    let mut alarm = alarm_for("abc123");
    alarm["id"] = json!("voltha.other.abc123");

    let failure = scenario(&server, FakeFeed::with_messages(vec![alarm]), false)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::IdentifierValidated);
    assert!(matches!(failure.error, CoreError::Grammar(_)));
}

#[tokio::test]
async fn test_cleanup_runs_after_failure() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;

    Mock::given(method("POST"))
        .and(path("/api/v1/local/devices/abc123/disable"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    // Delete fails; the scenario result must still be the alarm failure.
    Mock::given(method("DELETE"))
        .and(path("/api/v1/local/devices/abc123/delete"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let failure = scenario(&server, FakeFeed::with_messages(vec![]), true)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::AlarmObserved);
    assert!(matches!(failure.error, CoreError::AlarmNotFound { .. }));
}

#[tokio::test]
async fn test_cleanup_reported_on_success() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;

    Mock::given(method("POST"))
        .and(path("/api/v1/local/devices/abc123/disable"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/local/devices/abc123/delete"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let report = scenario(&server, FakeFeed::with_messages(vec![alarm_for("abc123")]), true)
        .run(&CancellationToken::new())
        .await
        .unwrap();

    let cleanup = report.cleanup.unwrap();
    assert!(cleanup.disabled);
    assert!(cleanup.deleted);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let failure = scenario(&server, FakeFeed::default(), false)
        .run(&cancel)
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::RestAvailabilityChecked);
    assert!(matches!(failure.error, CoreError::Cancelled));
}

#[tokio::test]
async fn test_check_topic() {
    let feed = FakeFeed::with_messages(vec![]);
    let cancel = CancellationToken::new();
    let budget = Duration::from_secs(2);
    check_topic(&feed, "voltha.alarms", budget, &cancel).await.unwrap();

    let err = check_topic(&feed, "voltha.heartbeat", budget, &cancel)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Topic voltha.heartbeat does not exist on broker fake-broker:9092"
    );
}

#[tokio::test]
async fn test_stalled_subscription_is_bounded_by_alarm_timeout() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;
    Mock::given(method("POST"))
        .and(path("/api/v1/local/devices/abc123/disable"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/local/devices/abc123/delete"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let failure = scenario(&server, FakeFeed::unresponsive(), true)
        .run(&CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::AlarmObserved);
    match &failure.error {
        CoreError::Timeout { target } => {
            assert_eq!(target, "subscription to voltha.alarms on fake-broker:9092");
        }
        other => panic!("expected Timeout, got: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(failure.device_id.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn test_cancel_interrupts_stalled_subscription() {
    let server = MockServer::start().await;
    mount_gateway(&server, "ENABLED").await;

    let mut config = config(&server, false);
    config.alarms.timeout = Duration::from_secs(60);
    let rest = RestClient::from_reqwest(config.rest_base_url.clone(), reqwest::Client::new());
    let scenario = Scenario::new(config, rest, FakeFeed::unresponsive());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let failure = scenario.run(&cancel).await.unwrap_err();

    assert_eq!(failure.stage, Stage::AlarmObserved);
    assert!(matches!(failure.error, CoreError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_topic_listing_gives_up_on_silent_broker() {
    let feed = FakeFeed::unresponsive();
    let cancel = CancellationToken::new();
    let budget = Duration::from_millis(300);

    let started = std::time::Instant::now();
    let err = list_topics(&feed, budget, &cancel).await.unwrap_err();
    assert_eq!(err.to_string(), "Request to topic listing on fake-broker:9092 timed out");

    let err = check_topic(&feed, "voltha.alarms", budget, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}
