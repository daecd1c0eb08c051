// alarmprobe-core: alarm observation, validation and the end-to-end device
// scenario, built on the transports in alarmprobe-api.

pub mod config;
pub mod error;
pub mod model;
pub mod observer;
pub mod scenario;
pub mod validate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{AlarmCheck, EnvironmentConfig, ScenarioConfig, ServiceLocation};
pub use error::CoreError;
pub use observer::{
    MalformedPolicy, MessageSource, ObserveOptions, Observation, observe, observe_until, within,
};
pub use scenario::{
    AlarmFeed, CleanupOutcome, Scenario, ScenarioFailure, ScenarioReport, Stage, StageTiming,
    check_topic, list_topics,
};
pub use validate::{
    AlarmId, AlarmSchema, GrammarViolation, NAMESPACE, SchemaViolation, validate_alarm_id,
};

pub use model::{AdminState, AlarmEvent, CorrelationKey, Device, NewDevice};

// Transport types callers need to build a scenario.
pub use alarmprobe_api::{
    ConsulResolver, Endpoint, KafkaBroker, RestClient, SubscribeOptions, TlsMode, TransportConfig,
};
