//! `cleanbites cache` command.

use anyhow::{Context, Result};

use cleanbites::cache::ResponseCache;
use cleanbites::config::Config;
use cleanbites::store::ContentStore;

/// Cache subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum CacheAction {
    /// Show the number of cached responses
    Stats,
    /// Delete every cached response
    Clear,
}

pub(crate) fn cmd_cache(config: &Config, action: CacheAction) -> Result<()> {
    let cache_dir = config.storage.cache_dir();
    let cache = ResponseCache::new(ContentStore::new(&cache_dir));
    match action {
        CacheAction::Stats => {
            let stats = cache
                .stats()
                .with_context(|| format!("Failed to read cache at {}", cache_dir.display()))?;
            println!("Cache directory: {}", cache_dir.display());
            println!("Cached responses: {}", stats.total_entries);
        }
        CacheAction::Clear => {
            let removed = cache
                .clear()
                .with_context(|| format!("Failed to clear cache at {}", cache_dir.display()))?;
            println!("Removed {removed} cached response(s)");
        }
    }
    Ok(())
}
