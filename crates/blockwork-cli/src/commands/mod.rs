pub mod config;
pub mod daemon;
pub mod sites;
pub mod status;
pub mod sync;
pub mod unlock;

use blockwork_core::{AppContext, Config, StopSignal};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load config and wire the engine, with SIGINT/SIGTERM raising the stop signal.
pub fn load_context() -> Result<AppContext, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let stop = StopSignal::new();
    signal_hook::flag::register(signal_hook::consts::SIGTERM, stop.flag())?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, stop.flag())?;
    Ok(AppContext::from_config(config, stop)?)
}

/// Print `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
