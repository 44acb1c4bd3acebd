//! Main binary for the watchdog daemon (vmwatchd)

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use vmwatch_agent::{init_logging, Result, Watchdog};
use vmwatch_core::{InstanceGateway, WatchdogConfig};
use vmwatch_gateway::{ComputeGateway, Credentials, GatewayConfig};

#[derive(Parser)]
#[command(name = "vmwatchd")]
#[command(about = "Watchdog daemon for automatic start of preemptible instances")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short = 'C', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// OAuth/IAM token
    #[arg(short = 't', long, value_name = "TOKEN")]
    token: Option<String>,

    /// Interval for checkout instance state (in seconds)
    #[arg(short = 'I', long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Comma separated instance ids
    #[arg(short = 'i', long, value_name = "ID[,...]", value_delimiter = ',')]
    instances: Option<Vec<String>>,

    /// Log level
    #[arg(long, value_name = "LEVEL")]
    loglevel: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the watchdog
    Start {
        /// Override configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Generate default configuration
    Config {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Start { ref config }) => {
            let config_path = config.clone().or(cli.config.clone());
            start_watchdog(config_path, &cli).await
        }
        Some(Commands::Config { output }) => generate_config(output),
        Some(Commands::Validate { config }) => validate_config(config),
        None => {
            // Default behavior: start the watchdog
            let config_path = cli.config.clone();
            start_watchdog(config_path, &cli).await
        }
    }
}

async fn start_watchdog(config_path: Option<PathBuf>, cli: &Cli) -> Result<()> {
    // Load configuration; CLI overrides are applied before validation so an
    // id list or token given on the command line can complete a partial file
    let mut config = match config_path {
        Some(ref path) => WatchdogConfig::read_from_file(path)?,
        None => WatchdogConfig::read()?,
    };

    apply_overrides(&mut config, cli);
    config.validate()?;

    init_logging(&config.logging)?;

    if let Some(ref path) = config_path {
        info!("Loaded configuration from: {}", path.display());
    }

    // Acquire credentials and connect the gateway
    let credentials = Credentials::from_config(&config.auth)?;
    let gateway: Arc<dyn InstanceGateway> =
        Arc::new(ComputeGateway::connect(GatewayConfig::default(), credentials).await?);

    let mut watchdog = Watchdog::new(&config, gateway);

    if let Err(e) = watchdog.run().await {
        error!("Watchdog failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

fn apply_overrides(config: &mut WatchdogConfig, cli: &Cli) {
    if let Some(ref token) = cli.token {
        config.auth.token = Some(token.clone());
    }
    if let Some(interval) = cli.interval {
        config.interval = interval;
    }
    if let Some(ref instances) = cli.instances {
        config.instances = instances.clone();
    }
    if let Some(ref level) = cli.loglevel {
        config.logging.level = level.clone();
    }
}

fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let config = WatchdogConfig::default();

    if let Some(output_path) = output {
        config.to_file(&output_path)?;
        println!("Generated configuration file: {}", output_path.display());
    } else {
        let yaml = serde_yaml::to_string(&config)?;
        println!("{}", yaml);
    }

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());

    let config = WatchdogConfig::load_from_file(&config_path)?;

    println!("Configuration is valid");
    println!("Auth type: {}", config.auth.auth_type);
    println!("Checkout interval: {} seconds", config.interval);
    if config.uses_explicit_instances() {
        println!("Watching {} explicitly configured instances", config.instances.len());
    } else {
        println!(
            "Watching folder {} via label '{}'",
            config.folder_id.as_deref().unwrap_or("<unset>"),
            config.label_name
        );
    }

    Ok(())
}
