use anyhow::Result;
use clap::{Parser, Subcommand};

use anima_broker::{Broker, EXIT_BUS_CONTENTION};
use anima_core::{AnimaConfig, AnimaError};
use anima_sensors::{LinuxSensors, MockSensors, SensorBackend};
use anima_server::{run_orchestrator, serve, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Anima, an embodied creature runtime", long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "anima_config.yaml", env = "ANIMA_CONFIG")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hardware broker (the creature's body)
    Broker {
        /// Use the mock sensor backend instead of real hardware
        #[arg(long)]
        mock: bool,
    },
    /// Run the query/tool server (the creature's voice)
    Server {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn init_tracing(args: &Args) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args);

    let config = AnimaConfig::load_or_default(&args.config);

    match args.command {
        Command::Broker { mock } => {
            let sensors: Box<dyn SensorBackend> = if mock {
                tracing::info!("Using mock sensors");
                Box::new(MockSensors::new())
            } else {
                Box::new(LinuxSensors::discover())
            };

            let broker = match Broker::start(config, sensors).await {
                Ok(broker) => broker,
                Err(e) => {
                    // Bus contention gets its own conventional exit code so
                    // supervisors can tell it from a crash.
                    if e.downcast_ref::<AnimaError>()
                        .map(|e| matches!(e, AnimaError::BusContention))
                        .unwrap_or(false)
                    {
                        tracing::error!(
                            "Another broker already owns the hardware bus; exiting"
                        );
                        std::process::exit(EXIT_BUS_CONTENTION);
                    }
                    tracing::error!("Broker failed to start: {:#}", e);
                    std::process::exit(1);
                }
            };
            broker.run().await
        }
        Command::Server { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = match AppState::new(config).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!("Server failed to start: {:#}", e);
                    std::process::exit(1);
                }
            };
            let _http = serve(state.clone(), &host, port);
            run_orchestrator(state).await
        }
    }
}
