use super::config::cmd_config;
use super::convert::cmd_convert;
use super::env::CliArgs;
use super::order::cmd_order;
use super::run::cmd_run;
use super::validate::cmd_validate;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;
use anyhow::Result;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Validate(args) => cmd_validate(args, ctx).await,
        Commands::Order(args) => cmd_order(args, ctx).await,
        Commands::Convert(args) => cmd_convert(args, ctx).await,
        Commands::Run(args) => cmd_run(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
