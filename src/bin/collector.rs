use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use dccam::collector::{AdminClient, CollectorServer, DeviceSummary};
use dccam::config::DccamConfig;
use dccam::net::build_http_client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Reference collector for DCCam devices
#[derive(Parser, Debug)]
#[command(name = "dccam-collector")]
#[command(about = "Register DCCam devices, approve them and store their uploads")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "dccam.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<CollectorCommand>,
}

#[derive(Subcommand, Debug)]
enum CollectorCommand {
    /// Run the collector HTTP server (default)
    Serve,
    /// List every registered device
    Devices(AdminArgs),
    /// List devices awaiting approval
    Pending(AdminArgs),
    /// Approve a device key
    Allow {
        key: String,
        #[command(flatten)]
        admin: AdminArgs,
    },
    /// Remove a device key
    Deny {
        key: String,
        #[command(flatten)]
        admin: AdminArgs,
    },
    /// Change a device's display name
    Rename {
        key: String,
        name: String,
        #[command(flatten)]
        admin: AdminArgs,
    },
}

#[derive(clap::Args, Debug)]
struct AdminArgs {
    /// Collector base URL; defaults to the configured bind address and port
    #[arg(long)]
    url: Option<String>,

    /// Admin key; defaults to collector.admin_key from the configuration
    #[arg(long)]
    admin_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let config = DccamConfig::load_from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    match args.command.unwrap_or(CollectorCommand::Serve) {
        CollectorCommand::Serve => serve(&config).await,
        CollectorCommand::Devices(admin) => {
            print_devices(&admin_client(&config, &admin)?.devices().await?);
            Ok(())
        }
        CollectorCommand::Pending(admin) => {
            print_devices(&admin_client(&config, &admin)?.pending().await?);
            Ok(())
        }
        CollectorCommand::Allow { key, admin } => {
            println!("{}", admin_client(&config, &admin)?.allow(&key).await?);
            Ok(())
        }
        CollectorCommand::Deny { key, admin } => {
            println!("{}", admin_client(&config, &admin)?.deny(&key).await?);
            Ok(())
        }
        CollectorCommand::Rename { key, name, admin } => {
            println!("{}", admin_client(&config, &admin)?.rename(&key, &name).await?);
            Ok(())
        }
    }
}

async fn serve(config: &DccamConfig) -> Result<()> {
    let server = CollectorServer::from_config(&config.collector)?;
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            signal_token.cancel();
        }
    });

    server.run(shutdown).await.map_err(|e| {
        error!("Collector failed: {}", e);
        anyhow::Error::from(e)
    })
}

fn admin_client(config: &DccamConfig, args: &AdminArgs) -> Result<AdminClient> {
    let admin_key = args
        .admin_key
        .clone()
        .or_else(|| config.collector.admin_key.clone())
        .ok_or_else(|| anyhow!("No admin key: pass --admin-key or set collector.admin_key"))?;

    let url = args.url.clone().unwrap_or_else(|| {
        let host = match config.collector.bind.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            other => other,
        };
        format!("http://{}:{}", host, config.collector.port)
    });

    let client = build_http_client(Some(Duration::from_secs(10)))?;
    Ok(AdminClient::new(client, &url, admin_key))
}

fn print_devices(devices: &[DeviceSummary]) {
    if devices.is_empty() {
        println!("No devices");
        return;
    }
    for device in devices {
        let last_seen = device
            .last_request_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<40} {:<8} {:<24} registered {} last seen {}",
            device.key,
            format!("{:?}", device.status).to_lowercase(),
            device.name,
            device.registered_at.format("%Y-%m-%d %H:%M:%S"),
            last_seen
        );
    }
}

fn init_logging(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("dccam={},tower_http={}", level, level))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
