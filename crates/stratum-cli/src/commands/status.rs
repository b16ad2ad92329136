use serde_json::json;
use stratum_migrator::MigrationStatus;

use crate::commands::Settings;

pub async fn show(settings: &Settings, as_json: bool) -> anyhow::Result<()> {
    let migrator = settings.migrator().await?;
    let status = migrator.status().await?;

    if as_json {
        let entries: Vec<_> = status
            .iter()
            .map(|(file, status)| {
                let applied_at = match status {
                    MigrationStatus::Applied { applied_at } => Some(applied_at.to_rfc3339()),
                    MigrationStatus::Pending => None,
                };
                json!({
                    "filename": file.filename,
                    "path": file.path,
                    "type": file.kind,
                    "applied": status.is_applied(),
                    "applied_at": applied_at,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if status.is_empty() {
        println!("No migrations found in {}", settings.directory().display());
        return Ok(());
    }

    let pending = status.iter().filter(|(_, s)| !s.is_applied()).count();
    for (file, status) in &status {
        match status {
            MigrationStatus::Applied { applied_at } => {
                println!("  applied  {}  {}", applied_at.format("%Y-%m-%d %H:%M:%S"), file.filename)
            }
            MigrationStatus::Pending => {
                println!("  pending  {:19}  {}", "", file.filename)
            }
        }
    }
    println!("\n{} applied, {} pending", status.len() - pending, pending);

    Ok(())
}

pub async fn list(settings: &Settings) -> anyhow::Result<()> {
    let migrator = settings.migrator().await?;
    for path in migrator.all().await? {
        println!("{}", path.display());
    }
    Ok(())
}

pub async fn has(settings: &Settings, filename: &str) -> anyhow::Result<bool> {
    let migrator = settings.migrator().await?;
    let applied = migrator.has(filename).await?;
    println!("{}", if applied { "applied" } else { "not applied" });
    Ok(applied)
}
