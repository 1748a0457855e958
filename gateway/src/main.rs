//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! BSSCI gateway binary entry point
//!
//! Runs the service center listener until Ctrl-C.

mod settings;
mod sink;

use crate::settings::Settings;
use crate::sink::LoggingSink;
use bssci_service::BssciServer;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// BSSCI service center for mioty basestations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "BSSCI_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "BSSCI_BIND")]
    bind: Option<SocketAddr>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "bssci-gateway starting");

    let settings = match &cli.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            Settings::load(path)?
        }
        None => Settings::default(),
    };
    let mut config = settings.server_config();
    if let Some(bind) = cli.bind {
        config = config.with_bind_address(bind);
    }

    let server = BssciServer::new(config, Arc::new(LoggingSink)).await?;
    server.start().await?;
    info!(bind_address = %server.local_addr(), "Listening for basestations");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to wait for Ctrl-C");
    }

    info!("Shutdown requested");
    server.shutdown(true).await?;

    let metrics = server.metrics().snapshot();
    info!(
        total_connections = metrics.total_connections,
        handshakes = metrics.handshakes_completed,
        messages_received = metrics.messages_received,
        messages_sent = metrics.messages_sent,
        errors = metrics.total_errors(),
        uptime = ?metrics.uptime,
        "bssci-gateway stopped"
    );
    Ok(())
}
