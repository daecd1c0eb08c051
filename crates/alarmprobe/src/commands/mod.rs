//! Command dispatch: bridges CLI args -> core operations -> output formatting.

pub mod config_cmd;
pub mod resolve;
pub mod run;
pub mod topic;
pub mod validate;

use alarmprobe_config::Config;
use alarmprobe_core::{CoreError, EnvironmentConfig, KafkaBroker};
use tokio_util::sync::CancellationToken;

use crate::cli::{Command, GlobalOpts, OutputFormat};
use crate::config;
use crate::error::CliError;
use crate::output::Painter;

/// What every handler needs besides its own args.
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    pub painter: Painter,
    pub quiet: bool,
}

impl Context {
    pub fn load(global: &GlobalOpts) -> Result<Self, CliError> {
        let config = config::load_config(global)?;
        Ok(Self {
            format: config::output_format(global, &config),
            painter: Painter::new(global.color),
            quiet: global.quiet,
            config,
        })
    }
}

/// Connect to the broker the environment points at.
pub async fn connect_broker(env: &EnvironmentConfig) -> Result<KafkaBroker, CliError> {
    let endpoint = env.resolve_broker().await?;
    let broker = KafkaBroker::connect(&endpoint, env.http_timeout)
        .await
        .map_err(CoreError::from)?;
    Ok(broker)
}

/// Dispatch a command that talks to the system under test.
pub async fn dispatch(
    cmd: Command,
    global: &GlobalOpts,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let ctx = Context::load(global)?;
    match cmd {
        Command::Run(args) => run::handle(args, global, &ctx, cancel).await,
        Command::Topic(args) => topic::handle(args, global, &ctx, cancel).await,
        Command::Resolve(args) => resolve::handle(&args, global, &ctx).await,
        Command::Validate(args) => validate::handle(&args, global, &ctx),
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions are handled before dispatch".into(),
        )),
    }
}
