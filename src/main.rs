//! Toolchat - Agentic Tool-Calling Chat
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolchat::llm::OpenAiClient;
use toolchat::mcp::McpConnector;
use toolchat::tools::ToolCatalog;
use toolchat::{server, Agent, Config, Step};

/// Toolchat - LLM chat with tools served by an MCP tool host
#[derive(Parser, Debug)]
#[command(name = "toolchat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'd', global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the tool host on POST|GET|DELETE /mcp
    ToolHost {
        /// Listen port
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },

    /// Serve the chat endpoint on POST /api/chat
    ChatServer {
        /// Listen port
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Tool host endpoint
        #[arg(long, env = "MCP_URL")]
        mcp_url: Option<url::Url>,
    },

    /// Answer one query and print the step trace
    Ask {
        /// The question to ask
        query: String,

        /// Tool host endpoint
        #[arg(long, env = "MCP_URL")]
        mcp_url: Option<url::Url>,
    },

    /// Write the current config to the user config file
    InitConfig {
        /// Print the default config instead of writing
        #[arg(long)]
        print: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = match &args.config {
        Some(path) => {
            dotenvy::dotenv().ok();
            Config::load_from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?
                .with_env_overrides()
        }
        None => Config::load(),
    };

    if args.debug {
        config.agent.debug = true;
    }
    config.validate()?;

    let default_filter = if config.agent.debug {
        "toolchat=debug"
    } else {
        "toolchat=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::ToolHost { port } => {
            if let Some(port) = port {
                config.server.tool_host_port = port;
            }
            server::serve_tool_host(&config).await?;
        }
        Command::ChatServer { port, mcp_url } => {
            if let Some(port) = port {
                config.server.chat_port = port;
            }
            if let Some(url) = mcp_url {
                config.tool_host.url = url;
            }
            server::serve_chat(&config).await?;
        }
        Command::Ask { query, mcp_url } => {
            if let Some(url) = mcp_url {
                config.tool_host.url = url;
            }
            ask(&config, &query).await?;
        }
        Command::InitConfig { print: true } => {
            print!("{}", Config::default_config_toml());
        }
        Command::InitConfig { print: false } => {
            let path = config.save()?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

async fn ask(config: &Config, query: &str) -> anyhow::Result<()> {
    let llm = Arc::new(OpenAiClient::from_config(config)?);
    let catalog = ToolCatalog::new(Arc::new(McpConnector::new(config.tool_host.clone())));
    let agent = Agent::from_config(llm, config);

    let tools = catalog
        .ensure_connected()
        .await
        .with_context(|| format!("connecting to tool host at {}", config.tool_host.url))?;
    let outcome = agent.run(query, &tools).await;
    catalog.disconnect().await.ok();

    for step in outcome? {
        println!("{}", render_step(&step));
    }
    Ok(())
}

fn render_step(step: &Step) -> String {
    match step {
        Step::User(query) => format!("> {}", query),
        Step::Text(text) => text.clone(),
        Step::ToolCall(call) => call.clone(),
        Step::ToolResult(result) => format!("  = {}", result),
        Step::Error(error) => format!("! {}", error),
    }
}
