//! habit-dashboard binary

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use habit_dashboard::commands::{login, Command, Dashboard};
use habit_dashboard::Config;
use habit_store_client::StoreClient;
use habit_tracker::{FileCache, LocalCache, MonthKey, RestRemote, SESSION_TOKEN_KEY};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "habit-dashboard")]
#[command(about = "Track daily habits, weekly goals and monthly reflections")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "habit-dashboard.toml")]
    config: PathBuf,

    /// Backend URL (overrides config file)
    #[arg(long, env = "HABIT_BACKEND_URL")]
    backend_url: Option<String>,

    /// Backend API key (overrides config file)
    #[arg(long, env = "HABIT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Session cache file (overrides config file)
    #[arg(long, env = "HABIT_CACHE_PATH")]
    cache_path: Option<PathBuf>,

    /// Month to work on, "YYYY-MM" (default: current month)
    #[arg(short, long)]
    month: Option<MonthKey>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the dashboard
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("habit_dashboard=info".parse()?)
                .add_directive("habit_tracker=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(config = %cli.config.display(), "Loading configuration");

    let mut config = Config::load(&cli.config)?;

    // Apply CLI overrides
    if let Some(url) = cli.backend_url {
        config.backend.url = url;
    }
    if let Some(api_key) = cli.api_key {
        config.backend.api_key = api_key;
    }
    if let Some(path) = cli.cache_path {
        config.cache.path = path;
    }

    let cache = Arc::new(FileCache::open(&config.cache.path)?);
    let token = cache.get(SESSION_TOKEN_KEY)?;
    let client = StoreClient::new(config.store_config(token))?;
    let remote = Arc::new(RestRemote::new(client));

    if let Command::Login { email, password } = &cli.command {
        let session = login(&remote, cache.as_ref(), email, password).await?;
        println!("Signed in as {}", session.user.email.as_deref().unwrap_or(email));
        return Ok(());
    }

    let month = cli
        .month
        .unwrap_or_else(|| MonthKey::from_date(chrono::Utc::now().date_naive()));
    info!(backend = %config.backend.url, month = %month, "Starting dashboard");

    let dashboard = Dashboard::new(remote, cache, month, config.store.failure_policy);
    let output = dashboard.run(cli.command).await?;
    println!("{}", output);

    Ok(())
}
