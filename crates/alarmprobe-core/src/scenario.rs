// ── Alarm scenario orchestration ──
//
// Runs the end-to-end check as a strict sequence: REST liveness, device
// creation, activation, alarm observation, schema validation, id grammar
// validation. Each step gates the next; the first failure ends the run and
// names the step it happened in.

use std::future::Future;
use std::time::{Duration, Instant};

use alarmprobe_api::{KafkaBroker, RestClient, SubscribeOptions, Subscription};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScenarioConfig;
use crate::error::CoreError;
use crate::model::{AdminState, AlarmEvent, CorrelationKey, Device, NewDevice, ensure_admin_state};
use crate::observer::{MessageSource, Observation, observe_until, within};
use crate::validate::{AlarmSchema, validate_alarm_id};

// ── Stages ───────────────────────────────────────────────────────────

/// Scenario progress. Each variant is reached once the step it names has
/// succeeded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Init,
    RestAvailabilityChecked,
    DeviceCreated,
    DeviceActivated,
    AlarmObserved,
    SchemaValidated,
    IdentifierValidated,
    Done,
}

// ── Alarm feed ───────────────────────────────────────────────────────

/// Where alarm subscriptions come from: the broker, or a test double.
pub trait AlarmFeed {
    type Source: MessageSource + Send;

    /// Human-readable location of the feed, for diagnostics.
    fn describe(&self) -> String;

    fn topics(&self) -> impl Future<Output = Result<Vec<String>, CoreError>> + Send;

    fn open(
        &self,
        topic: &str,
        options: &SubscribeOptions,
    ) -> impl Future<Output = Result<Self::Source, CoreError>> + Send;

    /// Release a subscription. The default drops it.
    fn close(&self, source: Self::Source) {
        drop(source);
    }
}

impl AlarmFeed for KafkaBroker {
    type Source = Subscription;

    fn describe(&self) -> String {
        self.endpoint().to_owned()
    }

    fn topics(&self) -> impl Future<Output = Result<Vec<String>, CoreError>> + Send {
        async move { Ok(self.list_topics().await?) }
    }

    fn open(
        &self,
        topic: &str,
        options: &SubscribeOptions,
    ) -> impl Future<Output = Result<Self::Source, CoreError>> + Send {
        async move { Ok(self.subscribe(topic, options).await?) }
    }

    fn close(&self, source: Self::Source) {
        source.close();
    }
}

/// List the feed's topics, giving up after `timeout`.
pub async fn list_topics<F: AlarmFeed>(
    feed: &F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<String>, CoreError> {
    let deadline = tokio::time::Instant::now() + timeout;
    within(deadline, cancel, feed.topics())
        .await?
        .ok_or_else(|| CoreError::Timeout {
            target: format!("topic listing on {}", feed.describe()),
        })
}

/// Confirm `topic` exists on the feed.
pub async fn check_topic<F: AlarmFeed>(
    feed: &F,
    topic: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    let topics = list_topics(feed, timeout, cancel).await?;
    if topics.iter().any(|name| name == topic) {
        info!(topic, "alarm topic present");
        Ok(())
    } else {
        Err(CoreError::TopicMissing {
            topic: topic.to_owned(),
            broker: feed.describe(),
        })
    }
}

// ── Report and failure ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    pub disabled: bool,
    pub deleted: bool,
}

/// Everything a successful run observed.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub device: Device,
    /// The matched alarm exactly as received.
    pub alarm: Value,
    pub alarm_id: String,
    /// Stream messages read before the match, the match included.
    pub scanned: usize,
    pub stages: Vec<StageTiming>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupOutcome>,
}

impl ScenarioReport {
    pub fn event(&self) -> Result<AlarmEvent, CoreError> {
        AlarmEvent::from_value(&self.alarm)
    }
}

/// A failed run. `stage` is the step that did not complete.
#[derive(Debug, Error)]
#[error("{stage}: {error}")]
pub struct ScenarioFailure {
    pub stage: Stage,
    #[source]
    pub error: CoreError,
    /// Id of the device created before the failure, if any.
    pub device_id: Option<String>,
    pub stages: Vec<StageTiming>,
}

// ── Scenario ─────────────────────────────────────────────────────────

pub struct Scenario<F> {
    config: ScenarioConfig,
    rest: RestClient,
    feed: F,
}

/// Mutable bookkeeping for one run.
struct Progress {
    started: Instant,
    stages: Vec<StageTiming>,
    device_id: Option<String>,
}

impl Progress {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::new(),
            device_id: None,
        }
    }

    fn reached(&mut self, stage: Stage) {
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(%stage, elapsed_ms, "stage reached");
        self.stages.push(StageTiming { stage, elapsed_ms });
    }

    fn fail(&self, stage: Stage, error: CoreError) -> ScenarioFailure {
        warn!(%stage, error = %error, "scenario failed");
        ScenarioFailure {
            stage,
            error,
            device_id: self.device_id.clone(),
            stages: self.stages.clone(),
        }
    }
}

impl<F: AlarmFeed> Scenario<F> {
    pub fn new(config: ScenarioConfig, rest: RestClient, feed: F) -> Self {
        Self { config, rest, feed }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Run every step in order. When `cleanup` is configured the created
    /// device is disabled and deleted afterwards, whatever the outcome;
    /// cleanup problems are logged and never replace the run's result.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<ScenarioReport, ScenarioFailure> {
        let started_at = Utc::now();
        let mut progress = Progress::new();

        let outcome = self.steps(cancel, &mut progress).await;

        let cleanup = match (&progress.device_id, self.config.cleanup) {
            (Some(id), true) => Some(self.cleanup(id).await),
            _ => None,
        };

        let (device, alarm, alarm_id, scanned) = outcome?;
        progress.reached(Stage::Done);

        Ok(ScenarioReport {
            device,
            alarm,
            alarm_id,
            scanned,
            stages: progress.stages,
            started_at,
            finished_at: Utc::now(),
            cleanup,
        })
    }

    async fn steps(
        &self,
        cancel: &CancellationToken,
        progress: &mut Progress,
    ) -> Result<(Device, Value, String, usize), ScenarioFailure> {
        let alarms = &self.config.alarms;

        let schema = AlarmSchema::new(alarms.strict_schema).map_err(|e| progress.fail(Stage::Init, e))?;
        progress.reached(Stage::Init);

        let stage = Stage::RestAvailabilityChecked;
        guard(cancel).map_err(|e| progress.fail(stage, e))?;
        self.rest
            .check_api()
            .await
            .map_err(|e| progress.fail(stage, e.into()))?;
        progress.reached(stage);

        let stage = Stage::DeviceCreated;
        guard(cancel).map_err(|e| progress.fail(stage, e))?;
        let created = self
            .rest
            .create_device(&NewDevice::of_type(&alarms.device_type))
            .await
            .map_err(|e| progress.fail(stage, e.into()))?;
        progress.device_id = Some(created.id.clone());
        progress.reached(stage);

        let stage = Stage::DeviceActivated;
        guard(cancel).map_err(|e| progress.fail(stage, e))?;
        let device = self
            .activate(&created.id)
            .await
            .map_err(|e| progress.fail(stage, e))?;
        progress.reached(stage);

        let stage = Stage::AlarmObserved;
        let (alarm, scanned) = self
            .observe_alarm(&device.id, cancel)
            .await
            .map_err(|e| progress.fail(stage, e))?;
        progress.reached(stage);

        let stage = Stage::SchemaValidated;
        schema
            .validate(&alarm)
            .map_err(|e| progress.fail(stage, e.into()))?;
        progress.reached(stage);

        let stage = Stage::IdentifierValidated;
        let id = alarm.get("id").and_then(Value::as_str).unwrap_or_default();
        let alarm_id = validate_alarm_id(id, &alarms.producer, &device.id)
            .map_err(|e| progress.fail(stage, e.into()))?;
        progress.reached(stage);

        Ok((device, alarm, alarm_id.to_string(), scanned))
    }

    async fn activate(&self, device_id: &str) -> Result<Device, CoreError> {
        self.rest.activate_device(device_id).await?;
        let device = self.rest.get_device(device_id).await?;
        ensure_admin_state(&device, AdminState::Enabled)?;
        Ok(device)
    }

    async fn observe_alarm(
        &self,
        device_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(Value, usize), CoreError> {
        let alarms = &self.config.alarms;
        let key = CorrelationKey::new(device_id);

        // Subscribing and waiting share one budget.
        let deadline = tokio::time::Instant::now() + alarms.timeout;
        let Some(mut source) =
            within(deadline, cancel, self.feed.open(&alarms.topic, &alarms.subscribe)).await?
        else {
            return Err(CoreError::Timeout {
                target: format!("subscription to {} on {}", alarms.topic, self.feed.describe()),
            });
        };
        let observed = observe_until(&mut source, deadline, alarms.on_malformed, cancel, |message| {
            key.matches(message)
        })
        .await;
        self.feed.close(source);

        match observed? {
            Observation::Found { event, scanned } => Ok((event, scanned)),
            Observation::NotFound { scanned } => Err(CoreError::AlarmNotFound {
                device_id: device_id.to_owned(),
                scanned,
                waited_secs: alarms.timeout.as_secs(),
            }),
        }
    }

    async fn cleanup(&self, device_id: &str) -> CleanupOutcome {
        let mut outcome = CleanupOutcome::default();

        match self.rest.disable_device(device_id).await {
            Ok(()) => outcome.disabled = true,
            Err(e) => warn!(device_id, error = %e, "cleanup: disable failed"),
        }
        match self.rest.delete_device(device_id).await {
            Ok(()) => outcome.deleted = true,
            Err(e) => warn!(device_id, error = %e, "cleanup: delete failed"),
        }

        info!(device_id, disabled = outcome.disabled, deleted = outcome.deleted, "cleanup finished");
        outcome
    }
}

fn guard(cancel: &CancellationToken) -> Result<(), CoreError> {
    if cancel.is_cancelled() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}
