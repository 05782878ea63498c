//! citywatch -- crowd-density threat detection and city monitoring agents.
//!
//! This crate provides the shared store, the threat-detection loop, the
//! model-backed sentiment, insight and camera agents, data simulators, and a
//! read-only HTTP API. Each agent runs as its own process against one SQLite
//! database.

pub mod agents;
pub mod api;
pub mod config;
pub mod detect;
pub mod llm;
pub mod notify;
pub mod scheduler;
pub mod sim;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::config::{Config, Credentials};
use crate::detect::{AlertEmitter, SmsRoute, ThreatEngine, ThreatStore};
use crate::llm::GeminiClient;
use crate::notify::TwilioSms;
use crate::scheduler::{run_periodic, shutdown_on_ctrl_c};
use crate::storage::Store;

fn open_store(config: &Config) -> Result<Store> {
    info!(db_path = %config.store.db_path, "Initializing database");
    Store::open(&config.store.db_path)
}

/// SMS escalation is on only when the account, sender and recipient are all
/// configured.
fn sms_route(config: &Config, creds: &Credentials) -> Result<Option<SmsRoute>> {
    let (Some(twilio), Some(from), Some(to)) = (&creds.twilio, &creds.sms_from, &creds.sms_to) else {
        warn!("Twilio credentials or phone numbers missing, SMS alerts disabled");
        return Ok(None);
    };
    let channel = TwilioSms::new(
        &config.notify.base_url,
        twilio.clone(),
        Duration::from_secs(config.notify.timeout_secs),
    )?;
    Ok(Some(SmsRoute {
        channel: Arc::new(channel),
        to: to.clone(),
        from: from.clone(),
    }))
}

fn gemini(config: &Config, creds: &Credentials, agent: &str) -> Result<Option<GeminiClient>> {
    match &creds.gemini_api_key {
        Some(key) => Ok(Some(GeminiClient::new(&config.llm, key.clone())?)),
        None => {
            warn!(agent, "GEMINI_API_KEY not set, agent will not run");
            Ok(None)
        }
    }
}

/// Run the threat-detection loop until Ctrl-C.
pub async fn run_threat_agent(config: &Config, creds: &Credentials) -> Result<()> {
    let store: Arc<dyn ThreatStore> = Arc::new(open_store(config)?);
    let emitter = AlertEmitter::new(store.clone(), sms_route(config, creds)?);
    let mut engine = ThreatEngine::from_config(store, emitter, &config.threat);

    info!(
        medium = config.threat.medium_threshold,
        high = config.threat.high_threshold,
        cooldown_secs = config.threat.cooldown_secs,
        "Threat Detection Agent started"
    );
    let ticks = run_periodic(&mut engine, config.threat.poll_interval(), shutdown_on_ctrl_c()).await;
    info!(ticks, "Threat Detection Agent stopped");
    Ok(())
}

/// Run the sentiment agent until Ctrl-C. Exits cleanly without an API key.
pub async fn run_sentiment_agent(config: &Config, creds: &Credentials) -> Result<()> {
    let Some(client) = gemini(config, creds, "sentiment")? else {
        return Ok(());
    };
    let store = open_store(config)?;
    let mut agent = agents::SentimentAgent::new(store, Arc::new(client), &config.sentiment);
    let period = Duration::from_secs(config.sentiment.poll_interval_secs);
    run_periodic(&mut agent, period, shutdown_on_ctrl_c()).await;
    Ok(())
}

/// Run the city insights agent until Ctrl-C. Exits cleanly without an API key.
pub async fn run_insights_agent(config: &Config, creds: &Credentials) -> Result<()> {
    let Some(client) = gemini(config, creds, "insights")? else {
        return Ok(());
    };
    let store = open_store(config)?;
    let mut agent = agents::InsightsAgent::new(store, Arc::new(client), config.insights.clone());
    let period = Duration::from_secs(config.insights.interval_secs);
    run_periodic(&mut agent, period, shutdown_on_ctrl_c()).await;
    Ok(())
}

/// Run the camera feed agent until Ctrl-C. Exits cleanly without an API key.
pub async fn run_camera_agent(config: &Config, creds: &Credentials) -> Result<()> {
    let Some(client) = gemini(config, creds, "camera")? else {
        return Ok(());
    };
    let store = open_store(config)?;
    let mut agent = agents::CameraAgent::new(store, Arc::new(client), config.camera.clone());
    let period = Duration::from_secs(config.camera.interval_secs);
    run_periodic(&mut agent, period, shutdown_on_ctrl_c()).await;
    Ok(())
}

/// Append synthetic crowd samples until Ctrl-C.
pub async fn run_crowd_simulator(config: &Config) -> Result<()> {
    let mut sim = sim::CrowdSimulator::new(open_store(config)?);
    let period = Duration::from_secs(config.simulation.crowd_interval_secs);
    run_periodic(&mut sim, period, shutdown_on_ctrl_c()).await;
    Ok(())
}

/// Append synthetic social posts until Ctrl-C.
pub async fn run_social_simulator(config: &Config) -> Result<()> {
    let mut sim = sim::SocialSimulator::new(open_store(config)?);
    let period = Duration::from_secs(config.simulation.social_interval_secs);
    run_periodic(&mut sim, period, shutdown_on_ctrl_c()).await;
    Ok(())
}

/// Serve the read API on `bind`.
pub async fn serve(config: &Config, bind: &str) -> Result<()> {
    let store = open_store(config)?;
    let app = api::router(api::state::AppState::new(store, config));

    let addr: std::net::SocketAddr = bind.parse()?;
    info!(%addr, "citywatch API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let cancel = shutdown_on_ctrl_c();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}
