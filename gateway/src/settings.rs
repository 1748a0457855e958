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

//! Configuration file handling

use bssci_service::{ServerConfig, TlsSettings};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while loading the configuration file
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was requested
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unknown keys
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Gateway configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Listener and protocol timing
    pub server: ServerSection,
    /// Certificate material
    pub tls: TlsSection,
}

/// `[server]` table
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind_address: SocketAddr,
    pub ping_interval_secs: u64,
    pub status_interval_secs: u64,
    pub write_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    /// `0` leaves the OS keep-alive settings alone
    pub keepalive_secs: u64,
    pub max_connections: usize,
    pub max_payload_len: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        let defaults = ServerConfig::default();
        Self {
            bind_address: defaults.bind_address,
            ping_interval_secs: defaults.ping_interval.as_secs(),
            status_interval_secs: defaults.status_interval.as_secs(),
            write_timeout_secs: defaults.write_timeout.as_secs(),
            handshake_timeout_secs: defaults.handshake_timeout.as_secs(),
            keepalive_secs: defaults.keepalive.map_or(0, |d| d.as_secs()),
            max_connections: defaults.max_connections,
            max_payload_len: defaults.max_payload_len,
        }
    }
}

/// `[tls]` table
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TlsSection {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Build the server configuration
    pub fn server_config(&self) -> ServerConfig {
        let server = &self.server;
        let keepalive = match server.keepalive_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        ServerConfig::new(server.bind_address)
            .with_tls(TlsSettings {
                cert_path: self.tls.cert_path.clone(),
                key_path: self.tls.key_path.clone(),
                ca_path: self.tls.ca_path.clone(),
            })
            .with_ping_interval(Duration::from_secs(server.ping_interval_secs))
            .with_status_interval(Duration::from_secs(server.status_interval_secs))
            .with_write_timeout(Duration::from_secs(server.write_timeout_secs))
            .with_handshake_timeout(Duration::from_secs(server.handshake_timeout_secs))
            .with_keepalive(keepalive)
            .with_max_connections(server.max_connections)
            .with_max_payload_len(server.max_payload_len)
    }
}
