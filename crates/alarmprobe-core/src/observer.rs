// ── Event observer ──
//
// Bounded scan of a message stream for the first message a predicate
// accepts. The time budget covers the whole scan, not each message, and
// holds however fast messages arrive. The source is only borrowed:
// releasing the subscription stays with the caller on every exit path.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Anything that yields raw messages in arrival order.
///
/// `Ok(None)` means the source has nothing more to give (for a broker
/// subscription: its message cap is reached).
pub trait MessageSource {
    fn next_message(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, CoreError>> + Send;
}

impl MessageSource for alarmprobe_api::Subscription {
    fn next_message(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, CoreError>> + Send {
        async move {
            alarmprobe_api::Subscription::next_message(self)
                .await
                .map_err(CoreError::from)
        }
    }
}

/// What to do with a message that is not valid JSON.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MalformedPolicy {
    /// Log a warning and keep scanning.
    #[default]
    Skip,
    /// Fail the observation.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    /// Budget for the whole scan.
    pub timeout: Duration,
    pub on_malformed: MalformedPolicy,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            on_malformed: MalformedPolicy::Skip,
        }
    }
}

/// Result of a completed scan. `scanned` counts every message read,
/// malformed ones included.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Found { event: Value, scanned: usize },
    NotFound { scanned: usize },
}

impl Observation {
    pub fn scanned(&self) -> usize {
        match self {
            Self::Found { scanned, .. } | Self::NotFound { scanned } => *scanned,
        }
    }

    pub fn into_event(self) -> Option<Value> {
        match self {
            Self::Found { event, .. } => Some(event),
            Self::NotFound { .. } => None,
        }
    }
}

/// Read from `source` until `predicate` accepts a message, the source runs
/// dry, or `options.timeout` elapses.
///
/// Messages are tested in arrival order and the first accepted one is
/// returned; a message the predicate rejects is never returned. Cancelling
/// `cancel` ends the wait with [`CoreError::Cancelled`].
pub async fn observe<S, P>(
    source: &mut S,
    options: &ObserveOptions,
    cancel: &CancellationToken,
    predicate: P,
) -> Result<Observation, CoreError>
where
    S: MessageSource,
    P: FnMut(&Value) -> bool,
{
    let deadline = Instant::now() + options.timeout;
    observe_until(source, deadline, options.on_malformed, cancel, predicate).await
}

/// [`observe`] against an absolute deadline, for callers that spend part of
/// the budget before the first read (opening the subscription).
pub async fn observe_until<S, P>(
    source: &mut S,
    deadline: Instant,
    on_malformed: MalformedPolicy,
    cancel: &CancellationToken,
    mut predicate: P,
) -> Result<Observation, CoreError>
where
    S: MessageSource,
    P: FnMut(&Value) -> bool,
{
    let mut scanned = 0;
    let scan = scan(source, deadline, on_malformed, &mut predicate, &mut scanned);

    match within(deadline, cancel, scan).await? {
        Some(Some(event)) => Ok(Observation::Found { event, scanned }),
        Some(None) => Ok(Observation::NotFound { scanned }),
        None => {
            debug!(scanned, "observation timed out");
            Ok(Observation::NotFound { scanned })
        }
    }
}

/// Await `fut` until `deadline` unless `cancel` fires first.
///
/// `Ok(None)` means the deadline passed before `fut` finished.
pub async fn within<F, T>(
    deadline: Instant,
    cancel: &CancellationToken,
    fut: F,
) -> Result<Option<T>, CoreError>
where
    F: Future<Output = Result<T, CoreError>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::Cancelled),
        outcome = tokio::time::timeout_at(deadline, fut) => match outcome {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        },
    }
}

async fn scan<S, P>(
    source: &mut S,
    deadline: Instant,
    policy: MalformedPolicy,
    predicate: &mut P,
    scanned: &mut usize,
) -> Result<Option<Value>, CoreError>
where
    S: MessageSource,
    P: FnMut(&Value) -> bool,
{
    loop {
        // A source that is always ready never returns Pending on its own.
        tokio::task::coop::consume_budget().await;
        if Instant::now() >= deadline {
            debug!(scanned = *scanned, "budget spent while messages were still arriving");
            return Ok(None);
        }

        let Some(raw) = source.next_message().await? else {
            debug!(scanned = *scanned, "message source exhausted");
            return Ok(None);
        };
        *scanned += 1;

        let message: Value = match serde_json::from_slice(&raw) {
            Ok(message) => message,
            Err(e) => match policy {
                MalformedPolicy::Skip => {
                    warn!(error = %e, bytes = raw.len(), "skipping malformed message");
                    continue;
                }
                MalformedPolicy::Abort => {
                    return Err(CoreError::MalformedMessage {
                        message: e.to_string(),
                        raw: String::from_utf8_lossy(&raw).into_owned(),
                    });
                }
            },
        };

        if predicate(&message) {
            return Ok(Some(message));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::CorrelationKey;

    /// Yields queued messages, then either ends or stalls forever.
    struct Scripted {
        queue: VecDeque<Vec<u8>>,
        stall_when_empty: bool,
    }

    impl Scripted {
        fn ending(messages: &[&str]) -> Self {
            Self {
                queue: messages.iter().map(|m| m.as_bytes().to_vec()).collect(),
                stall_when_empty: false,
            }
        }

        fn stalling(messages: &[&str]) -> Self {
            Self {
                stall_when_empty: true,
                ..Self::ending(messages)
            }
        }
    }

    impl MessageSource for Scripted {
        fn next_message(
            &mut self,
        ) -> impl Future<Output = Result<Option<Vec<u8>>, CoreError>> + Send {
            let next = self.queue.pop_front();
            let stall = self.stall_when_empty;
            async move {
                match next {
                    Some(raw) => Ok(Some(raw)),
                    None if stall => std::future::pending().await,
                    None => Ok(None),
                }
            }
        }
    }

    fn by_device(id: &str) -> impl FnMut(&Value) -> bool {
        let key = CorrelationKey::new(id);
        move |message| key.matches(message)
    }

    #[tokio::test]
    async fn returns_first_matching_message() {
        let mut source = Scripted::ending(&[
            r#"{"resource_id":"zzz999","id":"first"}"#,
            r#"{"resource_id":"abc123","id":"second"}"#,
            r#"{"resource_id":"abc123","id":"third"}"#,
        ]);

        let observation = observe(
            &mut source,
            &ObserveOptions::default(),
            &CancellationToken::new(),
            by_device("abc123"),
        )
        .await
        .unwrap();

        assert_eq!(
            observation,
            Observation::Found {
                event: json!({"resource_id": "abc123", "id": "second"}),
                scanned: 2,
            }
        );
    }

    #[tokio::test]
    async fn other_devices_are_never_returned() {
        let mut source = Scripted::ending(&[
            r#"{"resource_id":"zzz999"}"#,
            r#"{"resource_id":"abc1234"}"#,
            r#"{"id":"voltha.simulated_olt.abc123"}"#,
        ]);

        let observation = observe(
            &mut source,
            &ObserveOptions::default(),
            &CancellationToken::new(),
            by_device("abc123"),
        )
        .await
        .unwrap();

        assert_eq!(observation, Observation::NotFound { scanned: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn silent_stream_times_out_within_budget() {
        let mut source = Scripted::stalling(&[r#"{"resource_id":"zzz999"}"#]);
        let options = ObserveOptions {
            timeout: Duration::from_secs(20),
            ..ObserveOptions::default()
        };

        let started = tokio::time::Instant::now();
        let observation = observe(&mut source, &options, &CancellationToken::new(), by_device("abc123"))
            .await
            .unwrap();

        assert_eq!(observation, Observation::NotFound { scanned: 1 });
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    /// Always has another unrelated message ready.
    struct Flood;

    impl MessageSource for Flood {
        fn next_message(
            &mut self,
        ) -> impl Future<Output = Result<Option<Vec<u8>>, CoreError>> + Send {
            std::future::ready(Ok(Some(br#"{"resource_id":"zzz999"}"#.to_vec())))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn busy_stream_still_honours_budget() {
        let options = ObserveOptions {
            timeout: Duration::from_millis(200),
            ..ObserveOptions::default()
        };
        let handle = tokio::spawn(async move {
            observe(&mut Flood, &options, &CancellationToken::new(), by_device("abc123")).await
        });

        let observation = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("observation must end near its budget")
            .unwrap()
            .unwrap();

        assert!(matches!(observation, Observation::NotFound { scanned } if scanned > 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn busy_stream_still_honours_cancellation() {
        let cancel = CancellationToken::new();
        let inner = cancel.clone();
        let handle = tokio::spawn(async move {
            observe(&mut Flood, &ObserveOptions::default(), &inner, by_device("abc123")).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let err = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("cancellation must be observed while messages keep arriving")
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
    }

    #[tokio::test]
    async fn malformed_messages_are_skipped_by_default() {
        let mut source = Scripted::ending(&["not json", r#"{"resource_id":"abc123"}"#]);

        let observation = observe(
            &mut source,
            &ObserveOptions::default(),
            &CancellationToken::new(),
            by_device("abc123"),
        )
        .await
        .unwrap();

        assert_eq!(observation.scanned(), 2);
        assert!(observation.into_event().is_some());
    }

    #[tokio::test]
    async fn malformed_message_aborts_when_configured() {
        let mut source = Scripted::ending(&["{oops", r#"{"resource_id":"abc123"}"#]);
        let options = ObserveOptions {
            on_malformed: MalformedPolicy::Abort,
            ..ObserveOptions::default()
        };

        let err = observe(&mut source, &options, &CancellationToken::new(), by_device("abc123"))
            .await
            .unwrap_err();

        match err {
            CoreError::MalformedMessage { raw, .. } => assert_eq!(raw, "{oops"),
            other => panic!("expected MalformedMessage, got: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_ends_wait_early() {
        let mut source = Scripted::stalling(&[]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = observe(&mut source, &ObserveOptions::default(), &cancel, |_| true)
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn malformed_policy_parses_from_config_text() {
        assert_eq!("skip".parse::<MalformedPolicy>().unwrap(), MalformedPolicy::Skip);
        assert_eq!("abort".parse::<MalformedPolicy>().unwrap(), MalformedPolicy::Abort);
        assert_eq!(MalformedPolicy::Abort.to_string(), "abort");
    }
}
