use intelligent_agent::agent::Agent;
use intelligent_agent::config::Config;
use intelligent_agent::gateway::{self, GatewayOptions};
use intelligent_agent::tools::ToolRegistry;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "intelligent-agent",
    version,
    about = "Conversational agent with web search, weather, notes and charts"
)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the chat gateway (default)
    Serve {
        /// Listen address (overrides the configuration file)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Run a single turn and print the reply
    Ask {
        /// The message to send
        message: String,
    },
    /// Invoke one tool directly
    Tool {
        /// Tool name, e.g. SystemTool
        name: String,
        /// Tool input, e.g. "date"
        input: String,
    },
    /// List the available tools
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // A missing .env file is normal.
    if let Ok(path) = dotenv::dotenv() {
        info!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();
    let cfg = Config::load_or_default(cli.config.as_deref())
        .await?
        .resolve_from_env()?;
    info!(
        notes = %cfg.notes_dir.display(),
        visualizations = %cfg.visualizations_dir.display(),
        model = %cfg.model.model,
        "configuration loaded"
    );

    match cli.command.unwrap_or(Command::Serve { addr: None }) {
        Command::Serve { addr } => serve(&cfg, addr).await,
        Command::Ask { message } => {
            let mut agent = Agent::from_config(&cfg);
            println!("{}", agent.run(&message).await);
            Ok(())
        }
        Command::Tool { name, input } => {
            let tools = ToolRegistry::from_config(&cfg);
            println!("{}", tools.call_tool(&name, &input).await);
            Ok(())
        }
        Command::Tools => {
            for meta in ToolRegistry::from_config(&cfg).list_tools() {
                println!("{}\n  {}\n", meta.name, meta.description.replace('\n', "\n  "));
            }
            Ok(())
        }
    }
}

async fn serve(cfg: &Config, addr: Option<String>) -> anyhow::Result<()> {
    let addr = addr.unwrap_or_else(|| cfg.gateway.addr.clone());
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid gateway address: {addr}"))?;

    let agent = Agent::from_config(cfg);
    let gw = gateway::start_gateway(addr, agent, GatewayOptions::from_config(cfg))
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!("\n  Intelligent Agent v{}", env!("CARGO_PKG_VERSION"));
    println!("  chat: http://{}/\n", gw.addr);

    tokio::signal::ctrl_c().await?;
    info!("received Ctrl-C, shutting down");
    gw.handle.abort();
    Ok(())
}
