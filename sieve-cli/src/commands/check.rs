//! Check command implementation.

use std::sync::Arc;

use anyhow::Result;
use sieve_core::{RuleResolver, TransformRegistry};
use tracing::debug;

use crate::output::Printer;
use crate::{Cli, ExitCode};

/// Run the check command.
///
/// Validates the job file, compiles every rule, and resolves the transforms
/// each rule names. Nothing is fetched.
pub fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.load_config()?;
    config.validate()?;

    let resolver = RuleResolver::with_rules(Arc::new(TransformRegistry::new()), config.rules.clone())?;
    if let Some(next) = &config.pagination.next_page {
        resolver.check(next)?;
    }
    debug!(rules = resolver.rules().len(), "Job is valid");

    let printer = Printer::new(cli.format, cli.pretty, cli.use_colors());
    printer.emit(&printer.render_check(&config)?)?;
    Ok(ExitCode::Success)
}
