use blockwork_core::TickReport;

use super::{load_context, CommandResult};

/// Run the auto-unlock loop until SIGINT/SIGTERM.
pub fn run() -> CommandResult {
    let mut ctx = load_context()?;
    let stop = ctx.stop.clone();
    let mut daemon = ctx.daemon();
    daemon.run(&stop);
    Ok(())
}

/// One tick, for cron-style scheduling.
pub fn check(json: bool) -> CommandResult {
    let mut ctx = load_context()?;
    let report = ctx.daemon().tick()?;
    if json {
        let value = serde_json::json!({
            "expired": report.expired,
            "pushed": report.pushed,
            "push_error": report.push_error,
            "auto_unlock": report.auto_unlock,
            "auto_unlock_error": report.auto_unlock_error,
            "skipped": report.skipped,
            "requests": report.requests.len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &TickReport) {
    if report.expired {
        println!("Unlock expired; sites blocked again.");
    }
    if let Some(error) = &report.push_error {
        println!("Blocklist push failed: {error}");
    }
    match (&report.auto_unlock, &report.skipped, &report.auto_unlock_error) {
        (Some(outcome), _, _) if outcome.is_unlocked() => println!("Conditions met; sites unlocked."),
        (Some(_), _, _) => println!("Conditions not met."),
        (None, Some(reason), _) => println!("Auto-unlock skipped: {reason:?}"),
        (None, None, Some(error)) => println!("Auto-unlock failed: {error}"),
        (None, None, None) => {}
    }
    for request in &report.requests {
        println!(
            "Phone request {} ({:?}): {}",
            request.request.id, request.request.kind, request.result.message
        );
    }
}
