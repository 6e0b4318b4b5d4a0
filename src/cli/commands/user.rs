use crate::config::Config;
use crate::db::Store;

pub async fn cmd_user_add(config: &Config, username: &str, verified: bool) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let (user, api_key) = store.create_user(username, verified).await?;

    println!("✓ Created user '{}' (ID: {})", user.username, user.id);
    if user.verified {
        println!("  Account is verified");
    }
    println!();
    println!("API key: {api_key}");
    println!("The key is not shown again; store it now.");

    Ok(())
}
