use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod cli;
mod config;
mod error;
mod handlers;
mod pages;
mod router;
mod schemas;
mod sms;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod tests;


use cli::Cli;

/// Main entry point for the EasyBill application.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "easybill=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    info!("EasyBill {} starting", env!("CARGO_PKG_VERSION"));

    Cli::parse().run().await
}
