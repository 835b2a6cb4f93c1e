use anyhow::Context;
use vms_config::VmsConfig;
use vms_db::VmStore;

use crate::cli::{ListArgs, OutputFormat};
use crate::output;

pub async fn handle(args: &ListArgs, config: &VmsConfig, format: OutputFormat) -> anyhow::Result<()> {
    let store = VmStore::open(&config.database)
        .await
        .with_context(|| format!("failed to open database '{}'", config.database.url))?;
    let session = store.session().await?;

    if args.scopes {
        let scopes = session.scopes().await.context("failed to list scopes")?;
        return output::output(scopes.as_slice(), format, output::scopes_text);
    }

    let scope = args.scope.clone().unwrap_or_else(|| config.scope());
    if scope.is_empty() {
        anyhow::bail!("no scope given and none configured; pass --scope or --scopes");
    }
    let records = session
        .list_scope(&scope)
        .await
        .with_context(|| format!("failed to list scope '{scope}'"))?;
    output::output(records.as_slice(), format, output::records_text)
}
