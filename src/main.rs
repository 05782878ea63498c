use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use citywatch::config::{Config, Credentials};
use citywatch::llm::GeminiClient;
use citywatch::storage::Store;

#[derive(Parser)]
#[command(
    name = "citywatch",
    about = "Crowd-density threat detection and city monitoring agents",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch crowd density and raise alerts (SMS on HIGH)
    ThreatAgent,

    /// Label new social posts with a sentiment
    SentimentAgent,

    /// Periodically summarise city data into insights
    InsightsAgent,

    /// Keep the dashboard camera image in step with HIGH alerts
    CameraAgent,

    /// Generate synthetic crowd-density samples
    SimulateCrowd,

    /// Generate synthetic social media posts
    SimulateSocial,

    /// Start the read-only HTTP API
    Serve {
        /// Bind address (overrides [api].bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the most recent alerts
    Alerts {
        /// Number of alerts to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// List text models available to the configured API key
    Models,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = Config::resolve(cli.config.as_deref())?;
    let creds = Credentials::from_env();

    match cli.command {
        Commands::ThreatAgent => citywatch::run_threat_agent(&config, &creds).await?,
        Commands::SentimentAgent => citywatch::run_sentiment_agent(&config, &creds).await?,
        Commands::InsightsAgent => citywatch::run_insights_agent(&config, &creds).await?,
        Commands::CameraAgent => citywatch::run_camera_agent(&config, &creds).await?,
        Commands::SimulateCrowd => citywatch::run_crowd_simulator(&config).await?,
        Commands::SimulateSocial => citywatch::run_social_simulator(&config).await?,
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.api.bind.clone());
            tracing::info!(%bind, "Starting citywatch API");
            citywatch::serve(&config, &bind).await?;
        }
        Commands::Alerts { limit } => {
            let store = Store::open(&config.store.db_path)?;
            let alerts = store.recent_alerts(limit)?;
            if alerts.is_empty() {
                println!("No alerts recorded.");
            } else {
                println!("{:<20} | {:<25} | {:<6} | Details", "Time (UTC)", "Location", "Level");
                println!("{:-<20}-|-{:-<25}-|-{:-<6}-|-{:-<40}", "", "", "", "");
                for a in alerts {
                    println!(
                        "{:<20} | {:<25} | {:<6} | {}",
                        a.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        a.location_name,
                        a.threat_level,
                        a.details
                    );
                }
            }
        }
        Commands::Models => {
            let Some(key) = creds.gemini_api_key else {
                bail!("GEMINI_API_KEY is not set");
            };
            let client = GeminiClient::new(&config.llm, key)?;
            println!("Models supporting generateContent:");
            for model in client.list_models().await? {
                if model.supports_generate_content() {
                    println!(" - {}", model.name);
                }
            }
        }
    }

    Ok(())
}
