mod client;
mod config;
mod encoding;
mod error;
mod handler;
mod logging;
mod models;
mod openai;
mod request_id;
mod upstream;

use clap::{Parser, Subcommand};
use client::Uploader;
use client::imaging::CompressOptions;
use config::Config;
use handler::{AppState, app};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "pill-lens")]
#[command(about = "Identify medicines in a photo and list their possible interactions")]
struct Args {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// trace, debug, info, warn, error
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the analysis endpoint
    Serve {
        #[arg(short, long, default_value = "0.0.0.0")]
        ip: String,

        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// socks and http proxy for upstream calls, example: socks5://192.168.0.2:10080
        #[arg(long)]
        proxy: Option<String>,
    },
    /// Submit an image to an analysis endpoint and print the result
    Analyze(AnalyzeArgs),
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    file: PathBuf,

    /// Analysis endpoint, overrides client.endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Send the file as-is
    #[arg(long)]
    no_compress: bool,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    max_height: Option<u32>,

    /// JPEG quality between 0.0 and 1.0
    #[arg(long)]
    quality: Option<f32>,
}

async fn serve(config: Config, ip: String, port: u16, proxy: Option<String>) -> anyhow::Result<()> {
    let api_key = config.api_key()?;

    let client_builder = reqwest::Client::builder();
    let client_builder = if let Some(proxy) = &proxy {
        debug!("Using proxy: {}", proxy);
        client_builder.proxy(reqwest::Proxy::all(proxy)?)
    } else {
        client_builder
    };
    let http_client = Arc::new(client_builder.build()?);

    let app = app(AppState::new(config, http_client, api_key));

    let bind_address = format!("{}:{}", ip, port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server started on http://{}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn analyze(config: Config, args: AnalyzeArgs) -> anyhow::Result<()> {
    let client_config = config.client;
    let compression = (client_config.compress && !args.no_compress).then(|| CompressOptions {
        max_width: args.max_width.unwrap_or(client_config.max_width),
        max_height: args.max_height.unwrap_or(client_config.max_height),
        quality: args.quality.unwrap_or(client_config.quality),
    });
    let endpoint = args.endpoint.unwrap_or(client_config.endpoint);

    let mut uploader = Uploader::new(reqwest::Client::new(), endpoint)
        .with_compression(compression)
        .with_max_image_bytes(client_config.max_image_bytes);
    uploader.select_image(&args.file)?;
    if let Some(selected) = uploader.selected() {
        info!("Analyzing {} ({} bytes)", args.file.display(), selected.len());
    }
    uploader.submit().await?;
    println!("{}", uploader.result().unwrap_or_default());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::init_logging(logging::parse_level(&args.log_level), args.log_file.as_deref())?;
    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let config = Config::load(args.config.as_deref())?;
    if let Some(path) = &args.config {
        info!("Configuration loaded successfully from: {}", path);
    }

    match args.command {
        Command::Serve { ip, port, proxy } => serve(config, ip, port, proxy).await,
        Command::Analyze(analyze_args) => analyze(config, analyze_args).await,
    }
}
