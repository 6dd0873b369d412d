use std::io::{BufRead, Write};
use std::time::Duration;

use blockwork_core::clock::{Interrupted, Sleeper, ThreadSleeper};
use blockwork_core::error::UnlockError;
use blockwork_core::unlock::{format_duration, format_remaining, shame_prompt, CONFIRMATION_PHRASE};
use blockwork_core::{StopSignal, Trigger, UnlockOutcome};
use chrono::Local;

use super::{load_context, print_json, CommandResult};

/// Counts down on stderr once per second while waiting.
struct Countdown {
    inner: ThreadSleeper,
}

impl Countdown {
    fn new(stop: StopSignal) -> Self {
        Self {
            inner: ThreadSleeper::new(stop),
        }
    }
}

impl Sleeper for Countdown {
    fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        let mut left = duration.as_secs();
        let mut err = std::io::stderr();
        while left > 0 {
            let _ = write!(err, "\rWaiting... {} ", format_remaining(left as i64));
            let _ = err.flush();
            if let Err(e) = self.inner.sleep(Duration::from_secs(1)) {
                let _ = writeln!(err);
                return Err(e);
            }
            left -= 1;
        }
        let _ = writeln!(err, "\rWaiting... done   ");
        Ok(())
    }
}

pub fn unlock(json: bool) -> CommandResult {
    let ctx = load_context()?;
    let outcome = ctx.orchestrator.attempt_unlock(Trigger::Manual)?;
    if json {
        return print_json(&outcome);
    }
    match outcome {
        UnlockOutcome::Unlocked { description, expires_at, .. } => {
            println!("Unlocked: {description}");
            println!(
                "Sites unblocked until {}",
                expires_at.with_timezone(&Local).format("%H:%M")
            );
        }
        UnlockOutcome::AlreadyUnlocked { expires_at } => match expires_at {
            Some(at) => println!("Already unlocked until {}", at.with_timezone(&Local).format("%H:%M")),
            None => println!("Already unlocked"),
        },
        UnlockOutcome::NotMet { reports, .. } => {
            println!("Conditions not met; sites stay blocked.");
            for report in reports {
                println!("  - {}", report.description);
            }
        }
    }
    Ok(())
}

pub fn emergency() -> CommandResult {
    let ctx = load_context()?;
    let plan = ctx.orchestrator.emergency_preview()?;
    if !plan.available() {
        return Err(UnlockError::LimitExceeded {
            used: plan.used,
            max: plan.max,
        }
        .into());
    }

    println!();
    println!("  {}", shame_prompt());
    println!();
    println!(
        "Emergency unlocks left today: {}. This one costs a {}s wait and lasts {}.",
        plan.remaining(),
        plan.wait_secs,
        format_duration(plan.duration_secs)
    );
    print!("Type \"{CONFIRMATION_PHRASE}\" to continue: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let phrase = line.trim_end_matches(['\r', '\n']);

    let countdown = Countdown::new(ctx.stop.clone());
    let grant = ctx.orchestrator.emergency_unlock_with(phrase, &countdown)?;
    println!(
        "Emergency unlock active until {} ({} left today).",
        grant.expires_at.with_timezone(&Local).format("%H:%M:%S"),
        grant.remaining
    );
    Ok(())
}

pub fn on() -> CommandResult {
    let ctx = load_context()?;
    ctx.orchestrator.force_block()?;
    println!("Sites blocked.");
    Ok(())
}

pub fn off(minutes: Option<u64>) -> CommandResult {
    let ctx = load_context()?;
    let duration = minutes.map(|m| Duration::from_secs(m.saturating_mul(60)));
    let state = ctx.orchestrator.force_unblock(duration)?;
    match state.unlock_expires_at {
        Some(at) => println!("Sites unblocked until {}.", at.with_timezone(&Local).format("%H:%M")),
        None => println!("Sites unblocked."),
    }
    Ok(())
}
