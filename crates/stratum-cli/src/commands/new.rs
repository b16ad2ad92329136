use stratum_migrator::create_migration;

use crate::commands::Settings;

pub async fn create(settings: &Settings, name: &str) -> anyhow::Result<()> {
    let path = create_migration(settings.directory(), name).await?;
    println!("Created migration: {}", path.display());
    Ok(())
}
