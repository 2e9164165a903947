use std::path::Path;

use anyhow::bail;

use stackup_core::StackConfig;

pub fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    StackConfig::write_scaffold(path)?;
    println!("✓ Generated {}", path.display());
    Ok(())
}
