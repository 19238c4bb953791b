//! Run an emulated bridge, or manage its lights from the command line.
//!
//! The bridge identity and database come from the environment (`ADDRESS` is
//! required, see [`EmulatorConfig::from_env`]).
//!
//! Run with: ADDRESS=10.0.0.2:80 cargo run --example emulator -- --help

use clap::{Parser, Subcommand};
use hue_bridge_emulator::ssdp::DiscoveryListener;
use hue_bridge_emulator::store::SqliteStore;
use hue_bridge_emulator::{EmulatorConfig, Light, LightRegistry, StateChange, create_response, runtime};

#[derive(Parser)]
#[command(name = "hue-emulator")]
#[command(about = "Emulate a Hue bridge on the local network", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer discovery probes until Ctrl+C
    Serve,

    /// List stored lights
    List,

    /// Create a light
    Add {
        /// Unique light name
        name: String,
    },

    /// Delete a light
    Remove {
        /// Light id
        id: String,
    },

    /// Change the state of a light
    State {
        /// Light id
        id: String,
        #[arg(long)]
        on: Option<bool>,
        /// Brightness (0-254)
        #[arg(long)]
        bri: Option<u8>,
        /// Hue (0-65535)
        #[arg(long)]
        hue: Option<u16>,
        /// Saturation (0-254)
        #[arg(long)]
        sat: Option<u8>,
        /// Color temperature in mired
        #[arg(long)]
        ct: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let config = EmulatorConfig::from_env()?;
    let registry = LightRegistry::open(SqliteStore::open(&config.database_path)?)?;

    match cli.command {
        Commands::Serve => {
            for bridge in config.bridge_identities() {
                println!("Bridge {} at {}", bridge.serial_number(), bridge.location());
            }

            let responder = config.responder();
            let listener = DiscoveryListener::listen(
                config.discovery.network,
                &config.discovery.address,
                config.discovery.interface.as_deref(),
            )?;
            let shutdown = listener.shutdown_handle();
            let task = runtime::spawn(async move { listener.read(&responder).await });

            println!("Answering discovery probes... (Press Ctrl+C to stop)");
            tokio::signal::ctrl_c().await?;
            shutdown.shutdown();
            task.await;
        }

        Commands::List => {
            let lights = registry.list()?;
            if lights.is_empty() {
                println!("No lights stored.");
            }
            for (id, light) in lights {
                let power = if light.state.on { "ON" } else { "OFF" };
                println!("  {:>3}  {:20}  {:3}  bri {}", id, light.name, power, light.state.bri);
            }
        }

        Commands::Add { name } => match registry.put(Light::new(&name)) {
            Ok((light, id)) => {
                println!("{}", serde_json::to_string_pretty(&create_response(&light, &id)?)?)
            }
            Err(e) if e.is_duplicate_name() => eprintln!("Error: {}", e),
            Err(e) => return Err(e.into()),
        },

        Commands::Remove { id } => match registry.delete(&id) {
            Ok(()) => println!("Light {} deleted", id),
            Err(e) if e.is_not_found() => eprintln!("Error: {}", e),
            Err(e) => return Err(e.into()),
        },

        Commands::State {
            id,
            on,
            bri,
            hue,
            sat,
            ct,
        } => {
            let patch = StateChange {
                on,
                bri,
                hue,
                sat,
                ct,
                ..Default::default()
            };
            let acks = registry.apply_state(&id, &patch)?;
            println!("{}", serde_json::to_string_pretty(&acks)?);
        }
    }

    Ok(())
}
