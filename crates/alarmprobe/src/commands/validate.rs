//! `alarmprobe validate <file>`: schema and id checks on a saved alarm.

use std::io::Read;
use std::path::Path;

use alarmprobe_core::{AlarmSchema, CoreError, validate_alarm_id};
use serde::Serialize;
use serde_json::Value;

use super::Context;
use crate::cli::{GlobalOpts, ValidateArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Validated {
    alarm_id: String,
    producer: String,
    device_id: String,
    strict_schema: bool,
}

fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

pub fn handle(args: &ValidateArgs, global: &GlobalOpts, ctx: &Context) -> Result<(), CliError> {
    let env = config::environment(global, &ctx.config)?;
    let alarm: Value = serde_json::from_str(&read_input(&args.file)?)?;

    let strict = args.strict_schema || env.alarms.strict_schema;
    let schema = AlarmSchema::new(strict)?;
    schema.validate(&alarm).map_err(CoreError::from)?;

    let producer = args.producer.as_deref().unwrap_or(&env.alarms.producer);
    let device_id = match args.device_id.as_deref() {
        Some(id) => id,
        None => alarm
            .get("resource_id")
            .and_then(Value::as_str)
            .ok_or_else(|| CliError::Usage {
                field: "device-id".into(),
                reason: "the alarm has no resource_id; pass --device-id".into(),
            })?,
    };
    let id = alarm.get("id").and_then(Value::as_str).unwrap_or_default();
    let alarm_id = validate_alarm_id(id, producer, device_id).map_err(CoreError::from)?;

    let validated = Validated {
        alarm_id: alarm_id.to_string(),
        producer: producer.to_owned(),
        device_id: device_id.to_owned(),
        strict_schema: strict,
    };
    let out = output::render(ctx.format, &validated, |v| {
        format!("{}  {} is a valid alarm", ctx.painter.pass("PASS"), v.alarm_id)
    })?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
