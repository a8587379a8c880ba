//! Tether management CLI
//!
//! Works directly against the host settings file: prepare a pairing
//! session, inspect the stored state, manage trusted networks and tune
//! the connection policies. The running host picks the changes up on its
//! next launch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tether_host::{FileStore, PairingSession, Settings, TrustedNetwork};

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Manage tether host pairing and connection policies")]
struct Cli {
    /// Settings file (defaults to ~/.tether/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a fresh pairing session and print its token
    Pair,
    /// Show the stored session, credentials and policies
    Show,
    /// Forget the paired phone and its hotspot credentials
    Reset,
    /// Manage trusted networks (preferred over the hotspot)
    Trusted {
        #[command(subcommand)]
        command: TrustedCommands,
    },
    /// Change a connection policy
    Set {
        #[command(subcommand)]
        command: SetCommands,
    },
}

#[derive(Subcommand)]
enum TrustedCommands {
    /// List trusted networks
    List,
    /// Add or update a trusted network
    Add { ssid: String, password: String },
    /// Remove a trusted network
    Remove { ssid: String },
}

#[derive(Subcommand)]
enum SetCommands {
    /// Reconnect to the hotspot automatically when offline
    AutoConnect { value: bool },
    /// Drop the hotspot when the host goes to sleep
    SleepDisconnect { value: bool },
    /// Phone battery percentage below which the hotspot is dropped
    MinBattery { value: i8 },
    /// Share phone telemetry with the desktop UI
    Telemetry { value: bool },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let path = match cli.settings {
        Some(path) => path,
        None => dirs::home_dir()
            .ok_or("cannot determine home directory")?
            .join(".tether")
            .join("settings.json"),
    };
    let mut settings = Settings::new(FileStore::load(path));

    match cli.command {
        Commands::Pair => {
            let session = PairingSession::prepare(&mut settings);
            println!("service:  {}", session.service_id);
            println!("token:    {}", session.token());
            println!("Scan or enter the token on the phone to pair.");
        }
        Commands::Show => show(&settings),
        Commands::Reset => {
            settings.clear_session();
            println!("Session and hotspot credentials cleared.");
        }
        Commands::Trusted { command } => trusted(&mut settings, command),
        Commands::Set { command } => set(&mut settings, command),
    }
    Ok(())
}

fn show(settings: &Settings<FileStore>) {
    match PairingSession::load(settings) {
        Some(session) => {
            println!("service:  {}", session.service_id);
            match session.remote_endpoint {
                Some(endpoint) => println!("phone:    {endpoint}"),
                None => println!("phone:    not yet paired (awaiting handshake)"),
            }
        }
        None => println!("service:  no pairing session"),
    }
    match settings.hotspot_credentials() {
        Some(credentials) => println!("hotspot:  {}", credentials.ssid),
        None => println!("hotspot:  no credentials shared"),
    }
    println!("auto-connect:     {}", settings.auto_connect());
    println!("sleep-disconnect: {}", settings.sleep_disconnect());
    println!("min-battery:      {}%", settings.min_battery());
    println!("telemetry:        {}", settings.telemetry_visible());
    let trusted = settings.trusted_networks();
    if trusted.is_empty() {
        println!("trusted:          none");
    } else {
        for network in trusted {
            println!("trusted:          {}", network.ssid);
        }
    }
}

fn trusted(settings: &mut Settings<FileStore>, command: TrustedCommands) {
    match command {
        TrustedCommands::List => {
            for network in settings.trusted_networks() {
                println!("{}", network.ssid);
            }
        }
        TrustedCommands::Add { ssid, password } => {
            let mut networks = settings.trusted_networks();
            networks.retain(|network| network.ssid != ssid);
            networks.push(TrustedNetwork {
                ssid: ssid.clone(),
                password,
            });
            settings.set_trusted_networks(&networks);
            println!("Added {ssid}.");
        }
        TrustedCommands::Remove { ssid } => {
            let mut networks = settings.trusted_networks();
            let before = networks.len();
            networks.retain(|network| network.ssid != ssid);
            if networks.len() == before {
                println!("No trusted network named {ssid}.");
            } else {
                settings.set_trusted_networks(&networks);
                println!("Removed {ssid}.");
            }
        }
    }
}

fn set(settings: &mut Settings<FileStore>, command: SetCommands) {
    match command {
        SetCommands::AutoConnect { value } => settings.set_auto_connect(value),
        SetCommands::SleepDisconnect { value } => settings.set_sleep_disconnect(value),
        SetCommands::MinBattery { value } => settings.set_min_battery(value),
        SetCommands::Telemetry { value } => settings.set_telemetry_visible(value),
    }
}
