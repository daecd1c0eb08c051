// ── Alarm validation ──
//
// Two independent checks run on an observed alarm: its structure against
// the alarm schema, and its id against the `namespace.producer.device` grammar.

mod alarm_id;
mod schema;

pub use alarm_id::{AlarmId, GrammarViolation, NAMESPACE, Segment, validate_alarm_id};
pub use schema::{AlarmSchema, FieldViolation, SchemaViolation, alarm_schema_document};
