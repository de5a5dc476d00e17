use clap::Subcommand;

use super::config::ConfigArgs;
use super::convert::ConvertArgs;
use super::order::OrderArgs;
use super::run::RunArgs;
use super::validate::ValidateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Check node configs and graph structure
    Validate(ValidateArgs),

    /// Print the execution order of a flow
    Order(OrderArgs),

    /// Convert a flow between the linear and graph forms
    Convert(ConvertArgs),

    /// Run a flow against the simulated backend
    Run(RunArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
