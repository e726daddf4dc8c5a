use aeroinfo_core::{Aggregator, Config, LookupEvent, ProviderId, ResultStatus, Session, Stamped};
use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "aeroinfo", version, about = "Place details with current weather and elevation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials (or endpoint) for a specific provider.
    Configure {
        /// Provider short name: "opencage", "openweather" or "openelevation".
        provider: String,
    },

    /// Show location details, weather and elevation for a place.
    Show {
        /// Place name or address.
        place: String,

        /// Print the merged result as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Per-provider timeout in seconds; overrides the configured default.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { place, json, timeout } => show(&place, json, timeout).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_file()?;

    if id.requires_api_key() {
        let key = Password::new(&format!("API key for {id}:"))
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .context("Failed to read API key")?;

        let key = key.trim();
        if key.is_empty() {
            bail!("API key for {id} must not be empty");
        }
        config.set_provider_api_key(id, key.to_string());
    } else {
        let current = config.base_url(id);
        let url = Text::new(&format!("Base URL for {id}:"))
            .with_default(&current)
            .prompt()
            .context("Failed to read base URL")?;

        config.set_provider_base_url(id, url.trim().to_string());
    }

    config.save()?;
    println!("Saved {id} settings to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn show(place: &str, json: bool, timeout: Option<u64>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(secs) = timeout {
        config.timeout_secs = Some(secs);
        for settings in config.providers.values_mut() {
            settings.timeout_secs = None;
        }
    }

    let aggregator = Aggregator::from_config(&config)?;
    debug!(timeouts = ?aggregator.timeouts(), "Aggregator ready");
    let session = Session::new(Arc::new(aggregator));

    let delivery = if json {
        session.resolve(place).await?
    } else {
        let (tx, mut rx) = mpsc::unbounded_channel::<Stamped<LookupEvent>>();
        let printer = tokio::spawn(async move {
            while let Some(stamped) = rx.recv().await {
                if let Some(text) = render::event(&stamped.event) {
                    println!("{text}");
                }
            }
        });

        let delivery = session.resolve_streaming(place, &tx).await?;
        drop(tx);
        printer.await.context("Output task failed")?;
        delivery
    };

    let result = delivery
        .into_current()
        .ok_or_else(|| anyhow!("Lookup for '{place}' was superseded"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if result.status() == ResultStatus::Failed {
        bail!("Could not resolve '{place}'");
    }

    Ok(())
}
