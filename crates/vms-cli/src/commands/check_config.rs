use anyhow::Context;
use vms_config::VmsConfig;

use crate::cli::OutputFormat;
use crate::output;

/// Print the loaded configuration with secrets masked, then validate it.
pub fn handle(config: &VmsConfig, format: OutputFormat) -> anyhow::Result<()> {
    output::output(&config.redacted(), format, output::flat_text)?;
    config.validate().context("configuration is not usable for a sync run")?;
    tracing::info!(scope = %config.scope(), "configuration OK");
    Ok(())
}
