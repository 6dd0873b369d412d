//! Push the blocklist for the current state to the enforcement point.

use super::{load_context, CommandResult};

pub fn run() -> CommandResult {
    let ctx = load_context()?;
    let outcome = ctx.orchestrator.sync()?;
    let state = if outcome.blocked { "blocked" } else { "unblocked" };
    println!(
        "Synced ({state}): {} sites to {}",
        outcome.push.sites, outcome.push.target
    );
    Ok(())
}
