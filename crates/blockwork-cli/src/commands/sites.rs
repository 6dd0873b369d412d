//! Blocked site list management. Changes are saved, then pushed.

use blockwork_core::Config;

use super::{load_context, print_json, CommandResult};

pub fn list(json: bool) -> CommandResult {
    let config = Config::load()?;
    if json {
        return print_json(&config.blocked_sites);
    }
    if config.blocked_sites.is_empty() {
        println!("No sites blocked.");
    }
    for site in &config.blocked_sites {
        println!("{site}");
    }
    Ok(())
}

pub fn add(site: &str) -> CommandResult {
    let mut config = Config::load()?;
    if !config.add_blocked_site(site)? {
        println!("{site} is already blocked.");
        return Ok(());
    }
    config.save()?;
    println!("Added {site}.");
    push()
}

pub fn remove(site: &str) -> CommandResult {
    let mut config = Config::load()?;
    if !config.remove_blocked_site(site) {
        println!("{site} is not in the blocklist.");
        return Ok(());
    }
    config.save()?;
    println!("Removed {site}.");
    push()
}

fn push() -> CommandResult {
    let ctx = load_context()?;
    if let Err(e) = ctx.orchestrator.sync() {
        tracing::warn!(error = %e, "blocklist saved but not pushed");
        return Err(format!("saved, but the push failed: {e}; run `blockwork sync` to retry").into());
    }
    Ok(())
}
