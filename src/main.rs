use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{Table, Tabled};

use kasa::config::{default_config_path, DEFAULT_BASE_URL};
use kasa::{Config, Credentials, DeviceRecord, KasaClient};

#[derive(Parser)]
#[command(name = "kasa")]
#[command(about = "A CLI for controlling TP-Link Kasa smart plugs through the cloud")]
#[command(version)]
struct Cli {
    /// Path to the configuration file (defaults to ~/.kasa.json)
    #[arg(long, env = "KASA_CONFIG")]
    config: Option<PathBuf>,

    /// Username for the TP-Link account (skips the configuration file)
    #[arg(long, env = "KASA_USERNAME")]
    username: Option<String>,

    /// Password for the TP-Link account (optional, will prompt if not provided)
    #[arg(long, env = "KASA_PASSWORD")]
    password: Option<String>,

    /// Cloud endpoint used together with --username
    #[arg(long, env = "KASA_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all plugs registered to the account
    Devices {
        /// Print the registry as JSON keyed by alias
        #[arg(long)]
        json: bool,
    },
    /// Show whether a plug is on or off
    Status {
        /// Alias of the plug (optional if only one plug)
        alias: Option<String>,
    },
    /// Turn a plug on
    On {
        /// Alias of the plug (optional if only one plug)
        alias: Option<String>,
    },
    /// Turn a plug off
    Off {
        /// Alias of the plug (optional if only one plug)
        alias: Option<String>,
    },
    /// Switch a plug to the opposite state
    Toggle {
        /// Alias of the plug (optional if only one plug)
        alias: Option<String>,
    },
    /// Show the system information reported by a plug
    Info {
        /// Alias of the plug (optional if only one plug)
        alias: Option<String>,
    },
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Device ID")]
    device_id: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut client = build_client(&cli)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Connecting to the TP-Link cloud...");

    info!("Connecting to {}", client.base_url());
    let connected = client.initialize().await;
    spinner.finish_and_clear();
    connected.context("Failed to connect to the TP-Link cloud")?;
    debug!("Connected");

    match cli.command {
        Commands::Devices { json } => {
            let registry = client
                .devices()
                .context("Device list is not initialized")?;

            if json {
                let devices: BTreeMap<&str, &DeviceRecord> = registry.iter().collect();
                println!("{}", serde_json::to_string_pretty(&devices)?);
                return Ok(());
            }

            if registry.is_empty() {
                println!("No plugs found for this account.");
                return Ok(());
            }

            let rows: Vec<DeviceRow> = registry
                .iter()
                .map(|(alias, record)| DeviceRow {
                    alias: alias.to_string(),
                    model: record.model.clone(),
                    device_id: record.device_id.clone(),
                })
                .collect();

            println!("{}", Table::new(&rows));
        }
        Commands::Status { alias } => {
            let alias = resolve_alias(&client, alias)?;
            let on = client.get_state(&alias).await?;
            println!("{} is {}.", alias, on_off(on));
        }
        Commands::On { alias } => {
            let alias = resolve_alias(&client, alias)?;
            info!("Turning on {}", alias);
            switch(&mut client, &alias, true).await?;
        }
        Commands::Off { alias } => {
            let alias = resolve_alias(&client, alias)?;
            info!("Turning off {}", alias);
            switch(&mut client, &alias, false).await?;
        }
        Commands::Toggle { alias } => {
            let alias = resolve_alias(&client, alias)?;
            let on = client.toggle(&alias).await?;
            println!("{} is now {}.", alias, on_off(on));
        }
        Commands::Info { alias } => {
            let alias = resolve_alias(&client, alias)?;
            let sysinfo = client.get_sysinfo(&alias).await?;
            println!("{}", serde_json::to_string_pretty(&sysinfo)?);
        }
    }

    Ok(())
}

/// Credentials come from the command line when a username is given,
/// otherwise from the configuration file.
fn build_client(cli: &Cli) -> Result<KasaClient> {
    let client = match &cli.username {
        Some(username) => {
            let password = match &cli.password {
                Some(password) => password.clone(),
                None => rpassword::prompt_password("Password: ")
                    .context("Failed to read password")?,
            };
            KasaClient::new(Credentials::with_base_url(
                username.clone(),
                password,
                cli.url.clone(),
            ))
        }
        None => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => default_config_path()?,
            };
            let config = Config::load(&path).with_context(|| {
                format!(
                    "Not logged in. Provide --username or create {}",
                    path.display()
                )
            })?;
            KasaClient::from_config(&config)
        }
    };

    Ok(match cli.timeout {
        Some(secs) => client.with_timeout(Duration::from_secs(secs)),
        None => client,
    })
}

fn resolve_alias(client: &KasaClient, alias: Option<String>) -> Result<String> {
    match alias {
        Some(alias) => Ok(alias),
        None => client.default_alias().map(str::to_string).ok_or_else(|| {
            anyhow::anyhow!("Multiple or no plugs found. Please specify an alias.")
        }),
    }
}

async fn switch(client: &mut KasaClient, alias: &str, turn_on: bool) -> Result<()> {
    client.set_state(alias, turn_on).await?;
    println!("{} turned {}.", alias, on_off(turn_on));
    Ok(())
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}
