//! `alarmprobe run`: the full device-to-alarm scenario.

use std::fmt::Write as _;

use alarmprobe_core::{
    CoreError, KafkaBroker, RestClient, Scenario, ScenarioFailure, ScenarioReport, StageTiming,
};
use chrono::SecondsFormat;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Context;
use crate::cli::{GlobalOpts, RunArgs};
use crate::config;
use crate::error::CliError;
use crate::output::{self, Painter};

#[derive(Serialize)]
struct FailureReport<'a> {
    passed: bool,
    stage: String,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
    stages: &'a [StageTiming],
}

#[derive(Serialize)]
struct SuccessReport<'a> {
    passed: bool,
    #[serde(flatten)]
    report: &'a ScenarioReport,
}

pub async fn handle(
    args: RunArgs,
    global: &GlobalOpts,
    ctx: &Context,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let mut env = config::environment(global, &ctx.config)?;
    config::apply_run_args(&mut env, &args);

    let scenario_config = env.resolve().await?;
    let rest = RestClient::new(scenario_config.rest_base_url.clone(), &scenario_config.transport())
        .map_err(CoreError::from)?;
    let broker = KafkaBroker::connect(&scenario_config.broker_endpoint, scenario_config.http_timeout)
        .await
        .map_err(CoreError::from)?;
    debug!(rest = %scenario_config.rest_base_url, broker = %broker.endpoint(), "scenario targets");

    let scenario = Scenario::new(scenario_config, rest, broker);
    match scenario.run(cancel).await {
        Ok(report) => {
            let wrapped = SuccessReport {
                passed: true,
                report: &report,
            };
            let out = output::render(ctx.format, &wrapped, |w| render_success(w.report, ctx.painter))?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
        Err(failure) => {
            let summary = FailureReport {
                passed: false,
                stage: failure.stage.to_string(),
                error: failure.error.to_string(),
                device_id: failure.device_id.as_deref(),
                stages: &failure.stages,
            };
            let out = output::render(ctx.format, &summary, |_| render_failure(&failure, ctx.painter))?;
            output::print_output(&out, ctx.quiet);
            Err(failure.into())
        }
    }
}

fn stage_lines(out: &mut String, stages: &[StageTiming], painter: Painter) {
    for timing in stages {
        let _ = writeln!(
            out,
            "{}  {:<28} {}",
            painter.pass("PASS"),
            timing.stage.to_string(),
            painter.dim(&format!("{}ms", timing.elapsed_ms)),
        );
    }
}

fn render_success(report: &ScenarioReport, painter: Painter) -> String {
    let mut out = String::new();
    stage_lines(&mut out, &report.stages, painter);
    out.push('\n');
    let _ = writeln!(
        out,
        "device   {} ({}, {})",
        report.device.id, report.device.device_type, report.device.admin_state
    );
    let _ = writeln!(out, "alarm    {}", report.alarm_id);
    if let Ok(event) = report.event() {
        let _ = writeln!(
            out,
            "         {} {}/{}",
            event.severity.as_deref().unwrap_or("-"),
            event.alarm_type.as_deref().unwrap_or("-"),
            event.category.as_deref().unwrap_or("-"),
        );
        if let Some(raised) = event.raised_at() {
            let _ = writeln!(out, "raised   {}", raised.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
    }
    let _ = writeln!(out, "scanned  {} message(s)", report.scanned);
    let _ = writeln!(
        out,
        "started  {}",
        report.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    if let Some(ref cleanup) = report.cleanup {
        let _ = writeln!(
            out,
            "cleanup  disabled={} deleted={}",
            cleanup.disabled, cleanup.deleted
        );
    }
    let elapsed = report.finished_at - report.started_at;
    let _ = write!(
        out,
        "\n{} in {}ms",
        painter.pass("Scenario passed"),
        elapsed.num_milliseconds()
    );
    out
}

fn render_failure(failure: &ScenarioFailure, painter: Painter) -> String {
    let mut out = String::new();
    stage_lines(&mut out, &failure.stages, painter);
    let _ = write!(out, "{}  {}", painter.fail("FAIL"), failure.stage);
    if let Some(ref id) = failure.device_id {
        let _ = write!(out, "\n\ndevice   {id}");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use alarmprobe_core::Stage;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::cli::ColorMode;

    #[test]
    fn success_text_describes_matched_alarm() {
        let started_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let report = ScenarioReport {
            device: serde_json::from_value(json!({
                "id": "abc123",
                "type": "simulated_olt",
                "admin_state": "ENABLED"
            }))
            .unwrap(),
            alarm: json!({
                "id": "voltha.simulated_olt.abc123",
                "type": "COMMUNICATION",
                "category": "OLT",
                "severity": "MAJOR",
                "resource_id": "abc123",
                "raised_ts": 1_500_000_000.0
            }),
            alarm_id: "voltha.simulated_olt.abc123".into(),
            scanned: 3,
            stages: Vec::new(),
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(250),
            cleanup: None,
        };

        let text = render_success(&report, Painter::new(ColorMode::Never));
        assert!(text.contains("device   abc123 (simulated_olt, ENABLED)"));
        assert!(text.contains("alarm    voltha.simulated_olt.abc123\n         MAJOR COMMUNICATION/OLT"));
        assert!(text.contains("raised   2017-07-14T02:40:00Z"));
        assert!(text.contains("started  2024-03-01T12:00:00Z"));
        assert!(text.ends_with("Scenario passed in 250ms"));
    }

    #[test]
    fn failure_text_marks_failed_stage() {
        let failure = ScenarioFailure {
            stage: Stage::AlarmObserved,
            error: CoreError::AlarmNotFound {
                device_id: "abc123".into(),
                scanned: 10,
                waited_secs: 20,
            },
            device_id: Some("abc123".into()),
            stages: vec![
                StageTiming {
                    stage: Stage::Init,
                    elapsed_ms: 0,
                },
                StageTiming {
                    stage: Stage::RestAvailabilityChecked,
                    elapsed_ms: 4,
                },
            ],
        };
        let text = render_failure(&failure, Painter::new(ColorMode::Never));
        assert!(text.contains("PASS  rest_availability_checked"));
        assert!(text.contains("FAIL  alarm_observed"));
        assert!(text.ends_with("device   abc123"));
    }
}
