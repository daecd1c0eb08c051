//! Bounded Kafka topic subscription.
//!
//! Talks the broker protocol directly through `rskafka`. A [`Subscription`]
//! is a scoped handle: it is acquired with [`KafkaBroker::subscribe`], yields
//! raw record values in fetch order through [`Subscription::next_message`],
//! and is released by [`Subscription::close`] or when dropped.
//!
//! Time budgets are enforced by the caller (see the observer in
//! `alarmprobe-core`); each fetch is a broker-side long poll of at most
//! `max_wait`, so dropping a pending `next_message` future never leaves
//! the handle waiting on the network.
//!
//! ```rust,ignore
//! let broker = KafkaBroker::connect("10.0.0.7:9092", Duration::from_secs(10)).await?;
//! let mut sub = broker.subscribe("voltha.alarms", &SubscribeOptions::default()).await?;
//! while let Some(raw) = sub.next_message().await? {
//!     println!("{}", String::from_utf8_lossy(&raw));
//! }
//! sub.close();
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use rskafka::client::partition::{OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::client::{Client, ClientBuilder};
use tracing::{debug, trace};

use crate::error::Error;

// ── Options ──────────────────────────────────────────────────────────

/// Where and how much to read from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Partitions to read, visited round-robin.
    pub partitions: Vec<i32>,
    /// How many records before the current end of each partition to start at.
    pub lookback: u32,
    /// Stop after this many messages. `None` reads until the caller stops.
    pub max_messages: Option<usize>,
    /// Broker-side long-poll wait for a single fetch.
    pub max_wait: Duration,
    /// Upper bound on bytes returned by a single fetch.
    pub max_fetch_bytes: i32,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            partitions: vec![0],
            lookback: 5,
            max_messages: Some(10),
            max_wait: Duration::from_millis(500),
            max_fetch_bytes: 1_048_576,
        }
    }
}

// ── Broker ───────────────────────────────────────────────────────────

/// Connection to a Kafka cluster through one bootstrap broker.
pub struct KafkaBroker {
    client: Client,
    endpoint: String,
}

impl KafkaBroker {
    /// Connect to the broker at `endpoint` (`host:port`).
    ///
    /// `timeout` bounds the bootstrap handshake; an unreachable broker is
    /// reported instead of retried indefinitely.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, Error> {
        validate_endpoint(endpoint)?;
        debug!(endpoint, "connecting to broker");

        let build = ClientBuilder::new(vec![endpoint.to_owned()]).build();
        let client = tokio::time::timeout(timeout, build)
            .await
            .map_err(|_| Error::BrokerTimeout {
                endpoint: endpoint.to_owned(),
                timeout_secs: timeout.as_secs(),
            })??;

        Ok(Self {
            client,
            endpoint: endpoint.to_owned(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Names of all topics known to the cluster.
    pub async fn list_topics(&self) -> Result<Vec<String>, Error> {
        let mut names: Vec<String> = self
            .client
            .list_topics()
            .await?
            .into_iter()
            .map(|topic| topic.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Open a subscription positioned `lookback` records before the end of
    /// each requested partition (never before the earliest retained record).
    pub async fn subscribe(
        &self,
        topic: &str,
        options: &SubscribeOptions,
    ) -> Result<Subscription, Error> {
        let mut cursors = Vec::with_capacity(options.partitions.len());

        for &partition in &options.partitions {
            let client = self
                .client
                .partition_client(topic.to_owned(), partition, UnknownTopicHandling::Error)
                .await?;
            let earliest = client.get_offset(OffsetAt::Earliest).await?;
            let latest = client.get_offset(OffsetAt::Latest).await?;
            let next_offset = start_offset(earliest, latest, options.lookback);

            debug!(topic, partition, earliest, latest, next_offset, "partition subscribed");
            cursors.push(Cursor {
                client,
                partition,
                next_offset,
            });
        }

        Ok(Subscription {
            topic: topic.to_owned(),
            cursors,
            next_cursor: 0,
            pending: VecDeque::new(),
            delivered: 0,
            max_messages: options.max_messages,
            max_wait_ms: i32::try_from(options.max_wait.as_millis()).unwrap_or(i32::MAX),
            max_fetch_bytes: options.max_fetch_bytes.max(1),
            open: true,
        })
    }
}

// ── Subscription ─────────────────────────────────────────────────────

struct Cursor {
    client: PartitionClient,
    partition: i32,
    next_offset: i64,
}

/// Live read position on a topic. Released on [`close`](Self::close) or drop.
pub struct Subscription {
    topic: String,
    cursors: Vec<Cursor>,
    next_cursor: usize,
    pending: VecDeque<Vec<u8>>,
    delivered: usize,
    max_messages: Option<usize>,
    max_wait_ms: i32,
    max_fetch_bytes: i32,
    open: bool,
}

impl Subscription {
    /// `true` once the message cap has been reached.
    fn is_exhausted(&self) -> bool {
        self.max_messages.is_some_and(|max| self.delivered >= max)
    }

    /// Next record value in fetch order, or `None` when the message cap is
    /// reached. Blocks on broker long polls until a record arrives.
    pub async fn next_message(&mut self) -> Result<Option<Vec<u8>>, Error> {
        loop {
            if self.is_exhausted() || self.cursors.is_empty() {
                return Ok(None);
            }
            if let Some(value) = self.pending.pop_front() {
                self.delivered += 1;
                return Ok(Some(value));
            }
            self.fetch_round().await?;
        }
    }

    /// Fetch once from the next partition in round-robin order.
    async fn fetch_round(&mut self) -> Result<(), Error> {
        let index = self.next_cursor % self.cursors.len();
        self.next_cursor = index + 1;
        let cursor = &mut self.cursors[index];

        let (records, high_watermark) = cursor
            .client
            .fetch_records(cursor.next_offset, 1..self.max_fetch_bytes, self.max_wait_ms)
            .await?;

        trace!(
            partition = cursor.partition,
            offset = cursor.next_offset,
            high_watermark,
            fetched = records.len(),
            "fetch complete"
        );

        for record in records {
            cursor.next_offset = record.offset + 1;
            match record.record.value {
                Some(value) => self.pending.push_back(value),
                None => trace!(offset = record.offset, "skipping record without value"),
            }
        }
        Ok(())
    }

    /// Release the subscription.
    pub fn close(mut self) {
        self.open = false;
        debug!(topic = %self.topic, delivered = self.delivered, "subscription closed");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.open {
            debug!(topic = %self.topic, delivered = self.delivered, "subscription released on drop");
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn start_offset(earliest: i64, latest: i64, lookback: u32) -> i64 {
    (latest - i64::from(lookback)).max(earliest)
}

fn validate_endpoint(endpoint: &str) -> Result<(), Error> {
    let invalid = |reason: &str| Error::InvalidBroker {
        endpoint: endpoint.to_owned(),
        reason: reason.to_owned(),
    };
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;
    Ok(())
}
