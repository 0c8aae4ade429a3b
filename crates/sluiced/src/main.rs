use std::net::SocketAddr;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use sluiced::{
    command,
    config::{Config, ConfigError, LogFormat},
    VERSION,
};
use tracing_subscriber::{
    fmt::format::Format, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

static CONFIG: OnceCell<Config> = OnceCell::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing(cli: &Cli) -> Result<(), ConfigError> {
    if matches!(cli.command, Command::Serve) {
        let config = cli.config()?;

        let sub = tracing_subscriber::registry().with(env_filter());

        match config.log.format {
            LogFormat::Plaintext => {
                sub.with(tracing_subscriber::fmt::Layer::new().with_ansi(config.log.colors))
                    .init();
            }
            LogFormat::Json => {
                sub.with(tracing_subscriber::fmt::Layer::new().json())
                    .init();
            }
        }
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().event_format(Format::default().without_time()))
            .with(env_filter())
            .init();
    }

    Ok(())
}

async fn process_cli(cli: Cli) -> eyre::Result<()> {
    init_tracing(&cli)?;

    match &cli.command {
        Command::Serve => command::serve::run(cli.config()?).await?,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&cli.config()?)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli: Cli = Cli::parse();

    if let Err(e) = process_cli(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

#[derive(Parser)]
#[clap(version = VERSION)]
struct Cli {
    /// Set the config file path
    #[clap(long = "config", short, global = true, default_value = "sluiced.toml")]
    config_path: Utf8PathBuf,

    #[clap(long, global = true)]
    bind_addr: Option<SocketAddr>,

    /// Seconds to wait for in-flight work on shutdown, 0 waits indefinitely
    #[clap(long, global = true)]
    shutdown_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn config(&self) -> Result<Config, ConfigError> {
        CONFIG
            .get_or_try_init(|| {
                let mut config = Config::load(self.config_path.as_str())?;
                if let Some(bind_addr) = self.bind_addr {
                    config.api.bind_addr = bind_addr;
                }
                if let Some(secs) = self.shutdown_timeout {
                    config.shutdown.timeout_secs = secs;
                }
                Ok(config)
            })
            .cloned()
    }
}

#[derive(Subcommand)]
enum Command {
    /// Serve HTTP until interrupted, then drain in-flight work
    Serve,

    /// Print the effective configuration
    Config,
}
