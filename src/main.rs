//! dynip - keeps Azure DNS A records in sync with a dynamic DNS hostname.

use clap::{Parser, Subcommand};
use dynip::config::Config;
use dynip::providers::{create_accessor, AzureDnsAccessor, ZoneRecordAccessor};
use dynip::reconciler::{Reconciler, ReconcilerSettings};
use dynip::resolver::{AddressResolver, SystemResolver};
use dynip::schedule::{ScheduleProvider, TickInfo};
use dynip::trigger::Trigger;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dynip")]
#[command(about = "Keeps Azure DNS A records in sync with a dynamic DNS hostname")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Azure Functions style local.settings.json to overlay
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single reconciliation tick
    Run,

    /// Run the built-in timer at the configured schedule
    Daemon,

    /// Show the resolved address and each zone's current record
    Status,

    /// Validate configuration and credentials
    Validate,

    /// Show the active schedule and upcoming fire times
    Schedule {
        /// Number of fire times to show
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },

    /// Print an example configuration file
    Example,
}

fn get_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }

    // Default locations
    let candidates = [
        dirs::config_dir().map(|p| p.join("dynip/config.toml")),
        Some(PathBuf::from("/etc/dynip/config.toml")),
        Some(PathBuf::from("config.toml")),
    ];

    for candidate in candidates.into_iter().flatten() {
        if candidate.exists() {
            return candidate;
        }
    }

    // Return default even if it doesn't exist
    dirs::config_dir()
        .map(|p| p.join("dynip/config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

fn load_config(config: Option<PathBuf>, settings: Option<PathBuf>) -> anyhow::Result<Config> {
    let path = get_config_path(config);
    let mut config = Config::load_from(&path)?;

    if let Some(settings) = settings {
        config = config.with_local_settings(&settings)?;
    }

    Ok(config.with_environment())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dynip=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let config = load_config(cli.config, cli.settings)?;
            cmd_run(config).await?;
        }
        Commands::Daemon => {
            let config = load_config(cli.config, cli.settings)?;
            cmd_daemon(config).await?;
        }
        Commands::Status => {
            let config = load_config(cli.config, cli.settings)?;
            cmd_status(config).await?;
        }
        Commands::Validate => {
            let config = load_config(cli.config, cli.settings)?;
            cmd_validate(config).await?;
        }
        Commands::Schedule { count } => {
            let config = load_config(cli.config, cli.settings)?;
            cmd_schedule(config, count)?;
        }
        Commands::Example => {
            print!("{}", toml::to_string_pretty(&Config::example())?);
        }
    }

    Ok(())
}

fn build_reconciler(config: &Config) -> anyhow::Result<Reconciler> {
    config.validate()?;

    let settings = ReconcilerSettings::from_config(config)?;
    let accessor = create_accessor(config)?;

    Ok(Reconciler::new(
        settings,
        Box::new(SystemResolver::new()),
        accessor,
    ))
}

async fn cmd_run(config: Config) -> anyhow::Result<()> {
    let reconciler = build_reconciler(&config)?;
    let tick = TickInfo::manual(&reconciler.settings().schedule);

    // Failures are logged by the reconciler; the next scheduled run will try again.
    reconciler.run_once(&tick).await;

    Ok(())
}

async fn cmd_daemon(config: Config) -> anyhow::Result<()> {
    let reconciler = build_reconciler(&config)?;
    let trigger = Trigger::new(reconciler.settings().schedule.clone());

    trigger.run(&reconciler).await?;
    Ok(())
}

async fn cmd_status(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let accessor = create_accessor(&config)?;

    println!("dynip Status");
    println!("============\n");

    let resolved = match SystemResolver::new().resolve(&config.dynamic_dns_domain).await {
        Ok(ip) => {
            println!("{}: {}", config.dynamic_dns_domain, ip);
            Some(ip.to_string())
        }
        Err(e) => {
            println!("{}: {}", config.dynamic_dns_domain, e);
            None
        }
    };

    println!("\nZones ({}):", config.record_set_name);
    println!("---------");

    for zone in config.zone_refs() {
        print!("  {}: ", zone);

        match accessor.fetch(&zone, &config.record_set_name).await {
            Ok(record_set) => {
                let current = record_set.first_address();
                let marker = match (&current, &resolved) {
                    (Some(current), Some(resolved)) if current == resolved => "in sync",
                    (_, Some(_)) => "out of date",
                    _ => "unknown",
                };
                println!(
                    "{} ({}, {} record(s), etag {})",
                    current.as_deref().unwrap_or("(no record)"),
                    marker,
                    record_set.a_records.len(),
                    record_set.etag
                );
            }
            Err(e) => println!("error: {}", e),
        }
    }

    Ok(())
}

async fn cmd_validate(config: Config) -> anyhow::Result<()> {
    println!("Validating configuration...\n");

    if let Err(e) = config.validate() {
        println!("  {}", e);
        std::process::exit(1);
    }

    if let Err(e) = ScheduleProvider::from_config(&config).current_schedule() {
        println!("  {}", e);
        std::process::exit(1);
    }

    // The token acquired here is reused by the zone checks below.
    let accessor = AzureDnsAccessor::from_config(&config)?;

    print!("  credentials: ");
    match accessor.credential().token().await {
        Ok(_) => println!("OK"),
        Err(e) => {
            println!("FAILED - {}", e);
            std::process::exit(1);
        }
    }

    let mut all_valid = true;

    for zone in config.zone_refs() {
        print!("  {} ({}): ", zone, config.record_set_name);

        match accessor.fetch(&zone, &config.record_set_name).await {
            Ok(record_set) if record_set.a_records.is_empty() => {
                println!("FAILED - record set has no A records");
                all_valid = false;
            }
            Ok(_) => println!("OK"),
            Err(e) => {
                println!("FAILED - {}", e);
                all_valid = false;
            }
        }
    }

    println!();

    if all_valid {
        println!("Configuration is valid.");
    } else {
        println!("Some zones failed validation.");
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_schedule(config: Config, count: usize) -> anyhow::Result<()> {
    let schedule = ScheduleProvider::from_config(&config).current_schedule()?;

    println!("Schedule: {}", schedule);
    for fire_time in schedule.upcoming(chrono::Utc::now(), count) {
        println!("  {}", fire_time.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}
