use crate::cli::{Cli, Command};
use crate::commands;
use crate::commands::run::Pipelines;
use crate::context::AppContext;
use crate::error::AppResult;
use crate::logging;

pub async fn run(cli: Cli) -> AppResult<()> {
    let Cli {
        profile,
        json,
        verbose,
        log_file,
        command,
    } = cli;

    let overrides = command.overrides().clone().into();
    let ctx = AppContext::bootstrap(profile, json, verbose, overrides)?;

    let log_file = log_file.or_else(|| ctx.settings.log_file.clone());
    logging::init(verbose, log_file.as_deref())?;

    match command {
        Command::Run(_) => commands::run::run(&ctx, Pipelines::All).await,
        Command::Download(_) => commands::run::run(&ctx, Pipelines::Download).await,
        Command::Send(_) => commands::run::run(&ctx, Pipelines::Send).await,
        Command::Settings(_) => commands::settings::run(&ctx),
    }
}
