use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use doorman_config::{AuthMode, BindMode, DoormanConfig};

#[derive(Parser)]
#[command(name = "doorman", about = "Doorman — authenticated gateway for extension-hosted agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Directory to load doorman.{toml,yaml,yml,json} from, overriding the
    /// standard search locations.
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server.
    Gateway {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
        /// Listen on all interfaces instead of loopback.
        #[arg(long, default_value_t = false)]
        public: bool,
    },
    /// Validate the effective configuration and print a summary.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> DoormanConfig {
    if let Some(dir) = &cli.config_dir {
        doorman_config::set_config_dir(dir.clone());
    }
    doorman_config::discover_and_load()
}

fn doctor(config: &DoormanConfig) {
    println!("gateway:");
    println!("  bind:  {:?} ({})", config.gateway.bind_mode, config.gateway.bind_address());
    println!("  port:  {}", config.gateway.port);
    println!("  auth:  {:?}", config.gateway.auth_mode);
    match (config.gateway.auth_mode, &config.gateway.token) {
        (AuthMode::Token, None) => {
            println!("  WARN: auth mode is 'token' but no token is configured; all requests will be rejected");
        },
        (AuthMode::None, _) if config.gateway.bind_mode == BindMode::Public => {
            println!("  WARN: no auth on a public bind; every reachable client gets full access");
        },
        _ => {},
    }

    println!("google_auth:");
    if config.google_auth.enforcement_enabled() {
        println!("  enforcement: enabled");
        println!("  redirect:    {}", config.google_auth.redirect_uri());
        match config.google_auth.allowed_emails.len() {
            0 => println!("  allow-list:  empty (any verified Google account)"),
            n => println!("  allow-list:  {n} address(es)"),
        }
        if config.google_auth.sweep_interval_secs > config.google_auth.pending_ttl_secs {
            println!(
                "  WARN: sweep_interval_secs ({}) exceeds pending_ttl_secs ({})",
                config.google_auth.sweep_interval_secs, config.google_auth.pending_ttl_secs
            );
        }
    } else {
        println!("  enforcement: disabled (no client credentials; gate is fail-open)");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "doorman starting");

    match cli.command {
        Commands::Gateway { port, public } => {
            let mut config = load_config(&cli);
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if public {
                config.gateway.bind_mode = BindMode::Public;
            }
            doorman_gateway::server::start_gateway(config).await
        },
        Commands::Doctor => {
            let config = load_config(&cli);
            doctor(&config);
            Ok(())
        },
    }
}
