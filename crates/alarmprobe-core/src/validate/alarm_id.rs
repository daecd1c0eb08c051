//! Alarm identifier grammar: `<namespace>.<producer>.<device id>`.
//!
//! The whole string must match: exactly three dot-separated segments, each
//! non-empty and made of ASCII word characters (`[A-Za-z0-9_]`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Namespace every alarm id starts with.
pub const NAMESPACE: &str = "voltha";

const EXPECTED_FORMAT: &str = "voltha.<producer>.<device id>";

/// Position of a segment within an alarm id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Namespace,
    Producer,
    DeviceId,
}

impl Segment {
    const ALL: [Self; 3] = [Self::Namespace, Self::Producer, Self::DeviceId];
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Namespace => "namespace",
            Self::Producer => "producer",
            Self::DeviceId => "device id",
        })
    }
}

/// Why an alarm id was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarViolation {
    #[error("empty alarm id; expected format: {EXPECTED_FORMAT}")]
    Empty,

    #[error("'{id}' has {found} segments; expected format: {EXPECTED_FORMAT}")]
    SegmentCount { id: String, found: usize },

    #[error("'{id}' has an empty {segment} segment")]
    EmptySegment { id: String, segment: Segment },

    #[error("'{id}' has invalid character {ch:?} in its {segment} segment")]
    InvalidCharacter {
        id: String,
        segment: Segment,
        ch: char,
    },

    #[error("{segment} mismatch in alarm id: expected '{expected}', found '{found}'")]
    Mismatch {
        segment: Segment,
        expected: String,
        found: String,
    },
}

impl GrammarViolation {
    /// The segment the violation is about, when it concerns a single one.
    pub fn segment(&self) -> Option<Segment> {
        match self {
            Self::Empty | Self::SegmentCount { .. } => None,
            Self::EmptySegment { segment, .. }
            | Self::InvalidCharacter { segment, .. }
            | Self::Mismatch { segment, .. } => Some(*segment),
        }
    }
}

/// A parsed alarm id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlarmId {
    pub namespace: String,
    pub producer: String,
    pub device_id: String,
}

impl AlarmId {
    /// Parse `id` against the grammar. The namespace is not checked here;
    /// see [`validate_alarm_id`].
    pub fn parse(id: &str) -> Result<Self, GrammarViolation> {
        if id.is_empty() {
            return Err(GrammarViolation::Empty);
        }

        let parts: Vec<&str> = id.split('.').collect();
        let [namespace, producer, device_id] = parts.as_slice() else {
            return Err(GrammarViolation::SegmentCount {
                id: id.to_owned(),
                found: parts.len(),
            });
        };

        for (segment, text) in Segment::ALL.into_iter().zip([namespace, producer, device_id]) {
            if text.is_empty() {
                return Err(GrammarViolation::EmptySegment {
                    id: id.to_owned(),
                    segment,
                });
            }
            if let Some(ch) = text.chars().find(|c| !is_word_char(*c)) {
                return Err(GrammarViolation::InvalidCharacter {
                    id: id.to_owned(),
                    segment,
                    ch,
                });
            }
        }

        Ok(Self {
            namespace: (*namespace).to_owned(),
            producer: (*producer).to_owned(),
            device_id: (*device_id).to_owned(),
        })
    }

    fn require(&self, segment: Segment, expected: &str) -> Result<(), GrammarViolation> {
        let found = match segment {
            Segment::Namespace => &self.namespace,
            Segment::Producer => &self.producer,
            Segment::DeviceId => &self.device_id,
        };
        if found == expected {
            Ok(())
        } else {
            Err(GrammarViolation::Mismatch {
                segment,
                expected: expected.to_owned(),
                found: found.clone(),
            })
        }
    }
}

impl FromStr for AlarmId {
    type Err = GrammarViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.namespace, self.producer, self.device_id)
    }
}

/// Parse `id` and check each segment: namespace is [`NAMESPACE`], producer
/// is `expected_producer`, device id is `expected_device_id`.
pub fn validate_alarm_id(
    id: &str,
    expected_producer: &str,
    expected_device_id: &str,
) -> Result<AlarmId, GrammarViolation> {
    let parsed = AlarmId::parse(id)?;
    parsed.require(Segment::Namespace, NAMESPACE)?;
    parsed.require(Segment::Producer, expected_producer)?;
    parsed.require(Segment::DeviceId, expected_device_id)?;
    Ok(parsed)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
