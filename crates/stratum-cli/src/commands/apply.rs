use crate::commands::Settings;

pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let migrator = settings.migrator().await?;
    let applied = migrator.apply().await?;

    if applied.is_empty() {
        println!("Nothing to migrate");
    } else {
        for path in &applied {
            println!("Applied {}", path.display());
        }
        println!("{} migration(s) applied", applied.len());
    }

    Ok(())
}
