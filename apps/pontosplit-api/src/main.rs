//! Timesheet splitting API server

use anyhow::Result;
use clap::Parser;
use pontosplit_api::{router, AppState};
use pontosplit_core::SplitterConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pontosplit-api")]
#[command(version, about = "Split timesheet PDFs into one file per employee page")]
struct Args {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Root directory for job uploads and outputs
    #[arg(long, env = "PONTOSPLIT_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Seconds to keep a finished job's files before deleting them
    #[arg(long, env = "PONTOSPLIT_CLEANUP_SECS", default_value_t = 120)]
    cleanup_secs: u64,

    /// Above this many inputs the archive gets a generic name
    #[arg(long, env = "PONTOSPLIT_ARCHIVE_THRESHOLD", default_value_t = 5)]
    archive_threshold: usize,

    /// Skip optimized serialization of split pages
    #[arg(long, env = "PONTOSPLIT_NO_COMPRESS")]
    no_compress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pontosplit_api=info".parse()?)
                .add_directive("pontosplit_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let mut config = SplitterConfig::default()
        .with_data_dir(&args.data_dir)
        .with_cleanup_delay(Duration::from_secs(args.cleanup_secs))
        .with_archive_threshold(args.archive_threshold);
    config.compress = !args.no_compress;

    std::fs::create_dir_all(&config.data_dir)?;

    info!("Initializing splitting service...");
    let app = router(AppState::new(config));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting splitting API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
