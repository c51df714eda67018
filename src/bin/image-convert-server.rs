use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use image_convert::server::{mcp::McpServer, rest, sse, stdio, ServerConfig};
use image_convert::worker;
use log::LevelFilter;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "image-convert-server",
    version,
    about = "REST API and MCP tool server for image conversion"
)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the REST API
    Rest {
        #[command(flatten)]
        net: NetArgs,
    },
    /// Serve MCP tools over stdio, or over SSE with --sse
    Mcp {
        /// Use the SSE transport instead of stdio
        #[arg(long)]
        sse: bool,

        #[command(flatten)]
        net: NetArgs,
    },
}

#[derive(Args, Debug)]
struct NetArgs {
    /// Address to bind
    #[arg(long, env = "IMAGE_CONVERT_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "IMAGE_CONVERT_PORT", default_value_t = 8000)]
    port: u16,
}

fn main() -> anyhow::Result<()> {
    worker::run_if_worker();

    let cli = Cli::parse();

    // env_logger writes to stderr, which keeps stdout free for MCP stdio.
    env_logger::Builder::new()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    runtime.block_on(run(cli.command))
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let config = ServerConfig::default();

    match command {
        Commands::Rest { net } => rest::serve(&net.host, net.port, config)
            .await
            .with_context(|| format!("REST server on {}:{} failed", net.host, net.port)),
        Commands::Mcp { sse: false, .. } => {
            stdio::serve_stdio(Arc::new(McpServer::new(config)))
                .await
                .context("MCP stdio server failed")
        }
        Commands::Mcp { sse: true, net } => {
            sse::serve(&net.host, net.port, Arc::new(McpServer::new(config)))
                .await
                .with_context(|| format!("MCP SSE server on {}:{} failed", net.host, net.port))
        }
    }
}
