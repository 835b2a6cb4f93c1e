use std::sync::Arc;

use anyhow::Context;
use vms_config::VmsConfig;
use vms_db::VmStore;
use vms_inventory::VsphereProvider;
use vms_sync::{Reconciler, SyncError};

use crate::cli::{OutputFormat, SyncArgs};
use crate::output;

/// Exit code when no batch could be committed.
pub const EXIT_PERSISTENCE_UNAVAILABLE: i32 = 2;

/// Run one sync cycle and print its report. Returns the process exit code.
pub async fn handle(
    args: &SyncArgs,
    mut config: VmsConfig,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    args.apply(&mut config.sync);
    config.validate().context("invalid configuration")?;
    let scope = config.scope();

    let store = VmStore::open(&config.database)
        .await
        .with_context(|| format!("failed to open database '{}'", config.database.url))?;
    let provider = VsphereProvider::new(&config.vcenter, &config.sync, &scope)
        .context("failed to build vCenter client")?;
    let reconciler = Reconciler::new(Arc::new(provider), Arc::new(store), &config.sync, scope)?;

    match reconciler.run().await {
        Ok(report) => {
            output::output(&report, format, output::report_text)?;
            Ok(report.exit_code())
        }
        Err(SyncError::PersistenceUnavailable(report)) => {
            output::output(report.as_ref(), format, output::report_text)?;
            eprintln!("vmsync error: persistence unavailable, no batch was committed");
            Ok(EXIT_PERSISTENCE_UNAVAILABLE)
        }
        Err(error) => Err(error).context("sync run failed"),
    }
}
