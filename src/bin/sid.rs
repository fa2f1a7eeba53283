//! SID Server Binary
//!
//! Usage: sid [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to configuration file
//!   -g, --generate       Print a sample configuration
//!   -h, --help           Print help information

use std::env;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::watch;

use sid::config::Config;
use sid::cover::{image_board, Cover, ImageStore};
use sid::proxy::{ControlService, HttpService};
use sid::seal::Sealer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing — respects RUST_LOG env var (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut config_path = "sid.cfg".to_string();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                return Ok(());
            }
            "-g" | "--generate" => {
                print!("{}", Config::sample());
                return Ok(());
            }
            "-c" | "--config" => match iter.next() {
                Some(path) => config_path = path.clone(),
                None => {
                    eprintln!("Error: --config requires a file path");
                    return Ok(());
                }
            },
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                return Ok(());
            }
        }
    }

    run_server(&config_path).await
}

fn print_usage() {
    println!(
        r#"SID - Server In Disguise

USAGE:
    sid [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to configuration file (default: sid.cfg)
    -g, --generate          Print a sample configuration
    -h, --help              Print help information

EXAMPLES:
    Generate a configuration:
        sid --generate > sid.cfg

    Run the proxy:
        sid --config sid.cfg
"#
    );
}

async fn run_server(config_path: &str) -> anyhow::Result<()> {
    tracing::info!("==============================");
    tracing::info!("SID v0.2 -- Server In Disguise");
    tracing::info!("==============================");

    let config = if Path::new(config_path).exists() {
        tracing::info!("using configuration file '{}'", config_path);
        Config::load(Path::new(config_path))?
    } else {
        tracing::warn!("configuration file not available, using defaults");
        Config::default()
    };
    config.validate()?;

    tracing::info!("!==========< configuration >===============");
    tracing::info!("!Port for control sessions: {}", config.control_port);
    tracing::info!("!   Port for HTTP sessions: {}", config.http_port);
    tracing::info!(
        "!              SOCKS proxy: {}",
        config.socks_addr.as_deref().unwrap_or("<None>")
    );
    tracing::info!("!             Cover server: {}:{}", config.cover.host, config.cover.port);
    tracing::info!("!==========================================");

    // sealing parameters and reviewer keys; failure here aborts startup
    let sealer = Arc::new(Sealer::new(&config.upload)?);
    let images = Arc::new(ImageStore::load(&config.upload.images)?);

    let mut cover = Cover::new(
        config.cover.host.clone(),
        config.cover.port,
        config.cover.protocol.clone(),
        config.cover.post_path.clone(),
    )
    .with_plugin(image_board(Arc::clone(&images)));
    for (path, page) in &config.cover.pages {
        cover = cover.with_page(path.clone(), page.clone());
    }
    let seal_ref = Arc::clone(&sealer);
    let cover = Arc::new(cover.with_upload_handler(move |doc| seal_ref.seal(doc)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let control = ControlService::new(shutdown_tx, config.control_allow.clone());
    let control_port = config.control_port;
    tokio::spawn(async move {
        if let Err(e) = control.run(control_port).await {
            tracing::error!("control service failed: {}", e);
        }
    });

    let http = HttpService::new(
        Arc::clone(&cover),
        config.http_allow.clone(),
        config.socks_addr.clone(),
    );
    http.run(config.http_port, shutdown_rx).await?;

    tracing::info!("application terminated");
    Ok(())
}
