//! `alarmprobe resolve <service>`: registry lookup, prints `host:port`.

use serde::Serialize;

use super::Context;
use crate::cli::{GlobalOpts, ResolveArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Resolved<'a> {
    service: &'a str,
    host: String,
    port: u16,
    endpoint: String,
}

pub async fn handle(args: &ResolveArgs, global: &GlobalOpts, ctx: &Context) -> Result<(), CliError> {
    let env = config::environment(global, &ctx.config)?;
    let endpoint = env.resolve_service(&args.service).await?;

    let resolved = Resolved {
        service: &args.service,
        endpoint: endpoint.to_string(),
        host: endpoint.host,
        port: endpoint.port,
    };
    let out = output::render(ctx.format, &resolved, |r| r.endpoint.clone())?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
