use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "blockwork", version, about = "Block distracting sites until the work is done")]
struct Cli {
    /// Print machine-readable JSON where a command supports it
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show block state, remaining unlock time and condition results
    Status,
    /// Unlock if today's conditions are met
    Unlock,
    /// Unlock without conditions after a confirmation and an escalating wait
    Emergency,
    /// Block now, ending any unlock
    On,
    /// Unblock without conditions (administrative)
    Off {
        /// Minutes until the block returns (default: the proof-of-work duration)
        #[arg(long)]
        minutes: Option<u64>,
    },
    /// Push the blocklist the current state calls for
    Sync,
    /// Run the auto-unlock loop until interrupted
    Daemon,
    /// Run a single auto-unlock tick
    Check,
    /// List blocked sites
    List,
    /// Add a site to the blocklist
    Add {
        /// Domain, e.g. "news.ycombinator.com"
        site: String,
    },
    /// Remove a site from the blocklist
    Remove {
        /// Domain to remove
        site: String,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_logging(verbose_default: bool) {
    let default = if verbose_default { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(matches!(cli.command, Commands::Daemon | Commands::Check));

    let json = cli.json;
    let result = match cli.command {
        Commands::Status => commands::status::run(json),
        Commands::Unlock => commands::unlock::unlock(json),
        Commands::Emergency => commands::unlock::emergency(),
        Commands::On => commands::unlock::on(),
        Commands::Off { minutes } => commands::unlock::off(minutes),
        Commands::Sync => commands::sync::run(),
        Commands::Daemon => commands::daemon::run(),
        Commands::Check => commands::daemon::check(json),
        Commands::List => commands::sites::list(json),
        Commands::Add { site } => commands::sites::add(&site),
        Commands::Remove { site } => commands::sites::remove(&site),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
