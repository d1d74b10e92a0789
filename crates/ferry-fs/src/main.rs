use anyhow::Context;
use clap::Parser;
use ferry_fs::ServerConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Serve one managed directory to ferry clients
#[derive(Debug, Parser)]
#[command(name = "ferry-fs", version)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value_t = ServerConfig::default().bind)]
    bind: String,

    /// Managed directory, created if missing
    #[arg(long, default_value = "ServerFiles")]
    root: PathBuf,

    /// Per-read/per-write deadline in seconds; 0 disables it
    #[arg(long, default_value_t = 0)]
    timeout_secs: u64,

    /// Refuse uploads that would replace an existing file
    #[arg(long)]
    no_overwrite: bool,

    /// Directory for ferry-fs.log
    #[arg(long, default_value_os_t = std::env::temp_dir())]
    log_dir: PathBuf,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            bind: args.bind,
            root: args.root,
            io_timeout: (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs)),
            allow_overwrite: !args.no_overwrite,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let file_appender = rolling::never(&args.log_dir, "ferry-fs.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("ferry-fs starting");

    if let Err(e) = start(args.into()).await {
        error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

async fn start(config: ServerConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.root)
        .await
        .with_context(|| format!("creating {}", config.root.display()))?;
    ferry_fs::run(config).await?;
    Ok(())
}
