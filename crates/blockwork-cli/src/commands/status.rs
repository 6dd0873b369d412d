use blockwork_core::unlock::format_duration;
use blockwork_core::StatusReport;

use super::{load_context, print_json, CommandResult};

pub fn run(json: bool) -> CommandResult {
    let ctx = load_context()?;
    let report = ctx.orchestrator.status()?;
    if json {
        return print_json(&report);
    }
    print_report(&report);
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn print_report(report: &StatusReport) {
    if report.blocked {
        println!("Status:      BLOCKED");
    } else {
        println!("Status:      UNLOCKED ({} remaining)", report.unlock_remaining);
    }
    println!("Date:        {}", report.date);
    println!("Earned today: {}", yes_no(report.unlocked_via_conditions_today));
    println!(
        "Emergency:   {}/{} used, next wait {}s",
        report.emergency_count, report.emergency_max, report.next_emergency_wait
    );
    if report.next_emergency_wait >= 60 {
        println!("             ({})", format_duration(report.next_emergency_wait));
    }
    match report.last_check_at {
        Some(at) => println!("Last check:  {}", at.to_rfc3339()),
        None => println!("Last check:  never"),
    }
    println!("State:       {}", report.store);
    println!("Sites:       {} blocked when locked", report.blocked_sites);

    println!();
    println!(
        "Conditions:  {}",
        if report.conditions_satisfied { "met" } else { "not met" }
    );
    for condition in &report.conditions {
        let mark = if condition.met { "x" } else { " " };
        println!("  [{mark}] {}: {}", condition.name, condition.description);
    }
}
