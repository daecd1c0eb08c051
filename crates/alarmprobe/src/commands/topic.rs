//! `alarmprobe topic`: confirm the alarm topic exists, or list topics.

use alarmprobe_core::{AlarmFeed, check_topic, list_topics};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{Context, connect_broker};
use crate::cli::{GlobalOpts, TopicArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct TopicStatus<'a> {
    topic: &'a str,
    broker: String,
    present: bool,
}

pub async fn handle(
    args: TopicArgs,
    global: &GlobalOpts,
    ctx: &Context,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let env = config::environment(global, &ctx.config)?;
    let broker = connect_broker(&env).await?;

    if args.list {
        let topics = list_topics(&broker, env.alarms.timeout, cancel).await?;
        let out = output::render(ctx.format, &topics, |t| t.join("\n"))?;
        output::print_output(&out, ctx.quiet);
        return Ok(());
    }

    let topic = args.topic.as_deref().unwrap_or(&env.alarms.topic);
    check_topic(&broker, topic, env.alarms.timeout, cancel).await?;

    let status = TopicStatus {
        topic,
        broker: broker.describe(),
        present: true,
    };
    let out = output::render(ctx.format, &status, |s| {
        format!("{}  topic {} exists on {}", ctx.painter.pass("PASS"), s.topic, s.broker)
    })?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
