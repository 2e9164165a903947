use std::path::Path;

use tracing::info;

use stackup_bootstrap::Sequencer;

pub async fn up(config_path: &Path) -> anyhow::Result<()> {
    let stack = super::prepare(config_path, true).await?;
    let report = Sequencer::new(stack)?.run().await?;

    if let Some(db) = &report.database {
        info!(
            created = ?db.created,
            skipped = ?db.skipped,
            "buckets"
        );
    }
    for (key, attempts) in &report.published {
        info!(%key, attempts, "published");
    }

    println!("✓ Stack is up ({} phases)", report.phases.len());
    for (service, endpoint) in &report.endpoints {
        println!("  {service:<10} {}", endpoint.url("/"));
    }
    Ok(())
}
