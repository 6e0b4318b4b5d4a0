use crate::clients::{EnrichmentClient, EnrichmentSource};
use crate::config::Config;
use crate::db::Store;

pub async fn cmd_health(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    match store.ping().await {
        Ok(()) => println!("✓ Database reachable ({})", config.general.database_path),
        Err(e) => println!("✗ Database unreachable: {e}"),
    }

    if !config.remote.enabled {
        println!("○ Remote service disabled");
        return Ok(());
    }

    let remote = EnrichmentClient::new(config.remote.clone());
    if remote.health_check().await {
        println!("✓ Remote service reachable ({})", config.remote.base_url);
    } else {
        println!("✗ Remote service unreachable ({})", config.remote.base_url);
    }

    Ok(())
}
