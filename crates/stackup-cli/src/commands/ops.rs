//! Operator escape hatches.

use std::path::Path;

use stackup_bootstrap::tasks;

pub async fn scale(config_path: &Path, service: &str, count: u32) -> anyhow::Result<()> {
    let stack = super::prepare(config_path, false).await?;
    tasks::scale(&stack, service, count).await?;
    println!("✓ {service} scaled to {count}");
    Ok(())
}

pub async fn remove_bucket(config_path: &Path, name: &str) -> anyhow::Result<()> {
    let stack = super::prepare(config_path, false).await?;
    if tasks::remove_bucket(&stack, name).await? {
        println!("✓ Removed bucket {name}");
    } else {
        println!("Bucket {name} does not exist");
    }
    Ok(())
}

pub async fn endpoints(config_path: &Path) -> anyhow::Result<()> {
    let stack = super::prepare(config_path, false).await?;
    for (role, endpoint) in tasks::endpoints(&stack).await {
        let path = &stack.config.services.get(role).health_path;
        println!("{:<10} {}", role.label(), endpoint.url(path));
    }
    Ok(())
}

pub async fn down(config_path: &Path) -> anyhow::Result<()> {
    let stack = super::prepare(config_path, false).await?;
    tasks::down(&stack).await?;
    println!("✓ Stack stopped");
    Ok(())
}
