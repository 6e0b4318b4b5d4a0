//! One-shot search from the command line

use crate::config::Config;
use crate::models::search::{FILTER_CATEGORY, FILTER_LOCATION, SearchQuery};
use crate::models::service::REDACTED_CONTACT;
use crate::state::SharedState;

pub struct SearchArgs {
    pub query: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub page: u64,
    pub limit: Option<u64>,
    pub api_key: Option<String>,
}

pub async fn cmd_search(config: Config, args: SearchArgs) -> anyhow::Result<()> {
    let limit = args.limit.unwrap_or(config.search.default_limit);
    let state = SharedState::new(config).await?;

    let caller = match args.api_key.as_deref() {
        Some(key) => match state.account_service.authenticate(key).await? {
            Some(caller) => Some(caller),
            None => anyhow::bail!("API key does not match any account"),
        },
        None => None,
    };

    let query = SearchQuery::new(
        &args.query,
        [
            (FILTER_CATEGORY, args.category),
            (FILTER_LOCATION, args.location),
        ],
        args.page,
        limit,
    );

    println!("Searching for: {}", query.text);

    let response = state.search_service.search(&query, caller).await?;
    state.shutdown().await;

    if response.records.is_empty() {
        println!("No services found matching '{}'", query.text);
        return Ok(());
    }

    println!();
    println!(
        "Results {} (page {}, {} total):",
        response.records.len(),
        response.page,
        response.total
    );
    println!("{:-<60}", "");

    for record in &response.records {
        let badge = if record.premium_only { " [premium]" } else { "" };
        println!("• {}{} (rating {:.1})", record.title, badge, record.rating);
        if let Some(location) = &record.location {
            println!("  Location: {location}");
        }
        match record.contact_info.as_deref() {
            Some(REDACTED_CONTACT) => println!("  Contact: locked"),
            Some(contact) => println!("  Contact: {contact}"),
            None => {}
        }
        println!("  ID: {} | Tier: {}", record.id, record.price_tier);
        println!();
    }

    if response.has_next {
        println!("More results: svcdex search \"{}\" --page {}", query.text, response.page + 1);
    }

    Ok(())
}
