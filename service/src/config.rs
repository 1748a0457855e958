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

//! Service center configuration
//!
//! # Example
//!
//! ```
//! use bssci_service::{ServerConfig, TlsSettings};
//! use std::time::Duration;
//!
//! let config = ServerConfig::new("0.0.0.0:5005".parse().unwrap())
//!     .with_ping_interval(Duration::from_secs(60))
//!     .with_status_interval(Duration::from_secs(300))
//!     .with_tls(TlsSettings::new("server.pem", "server.key"));
//! assert!(config.validate().is_ok());
//! ```

use bssci_codec::DEFAULT_MAX_PAYLOAD_LEN;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default BSSCI listen port
pub const DEFAULT_PORT: u16 = 5005;

/// Certificate material for the listener
///
/// With neither certificate nor key configured, the server generates a
/// self-signed certificate at startup. A CA certificate turns on client
/// certificate verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// PEM certificate chain presented to basestations
    pub cert_path: Option<PathBuf>,
    /// PEM private key for `cert_path`
    pub key_path: Option<PathBuf>,
    /// PEM CA bundle used to verify basestation certificates
    pub ca_path: Option<PathBuf>,
}

impl TlsSettings {
    /// Create settings for a certificate and key
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: Some(cert_path.into()),
            key_path: Some(key_path.into()),
            ca_path: None,
        }
    }

    /// Require basestation certificates signed by the given CA
    pub fn with_client_ca(mut self, ca_path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(ca_path.into());
        self
    }

    /// Check if no certificate material is configured
    pub fn is_self_signed(&self) -> bool {
        self.cert_path.is_none() && self.key_path.is_none()
    }
}

/// Server configuration
///
/// Use the builder methods to customize the configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_address: SocketAddr,

    /// Certificate material
    pub tls: TlsSettings,

    /// Period of server-issued pings per basestation
    pub ping_interval: Duration,

    /// Period of server-issued status requests per basestation
    pub status_interval: Duration,

    /// Deadline for a single frame write, lock wait included
    pub write_timeout: Duration,

    /// Deadline for the TLS handshake and the first `con` frame
    pub handshake_timeout: Duration,

    /// TCP keep-alive idle time (`None` leaves the OS default)
    pub keepalive: Option<Duration>,

    /// Maximum number of concurrent sockets
    pub max_connections: usize,

    /// Largest accepted frame payload in bytes
    pub max_payload_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            tls: TlsSettings::default(),
            ping_interval: Duration::from_secs(60),
            status_interval: Duration::from_secs(300),
            write_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(30),
            keepalive: Some(Duration::from_secs(60)),
            max_connections: 1000,
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the listen address
    pub fn with_bind_address(mut self, bind_address: SocketAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    /// Set the certificate material
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// Set the ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the status request interval
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    /// Set the write timeout duration
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the handshake timeout duration
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the TCP keep-alive time
    pub fn with_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum frame payload length
    pub fn with_max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = len;
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.ping_interval.is_zero() {
            return Err("ping_interval must be greater than 0".to_string());
        }

        if self.status_interval.is_zero() {
            return Err("status_interval must be greater than 0".to_string());
        }

        if self.write_timeout.is_zero() {
            return Err("write_timeout must be greater than 0".to_string());
        }

        if self.handshake_timeout.is_zero() {
            return Err("handshake_timeout must be greater than 0".to_string());
        }

        if self.keepalive.is_some_and(|keepalive| keepalive.is_zero()) {
            return Err("keepalive must be greater than 0 when set".to_string());
        }

        if self.max_payload_len == 0 || self.max_payload_len > u32::MAX as usize {
            return Err("max_payload_len must be between 1 and u32::MAX".to_string());
        }

        if self.tls.cert_path.is_some() != self.tls.key_path.is_some() {
            return Err("tls cert_path and key_path must be configured together".to_string());
        }

        if self.tls.ca_path.is_some() && self.tls.is_self_signed() {
            return Err("tls ca_path requires cert_path and key_path".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
        assert_eq!(config.ping_interval, Duration::from_secs(60));
        assert_eq!(config.status_interval, Duration::from_secs(300));
        assert!(config.tls.is_self_signed());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ServerConfig::default()
            .with_max_connections(500)
            .with_write_timeout(Duration::from_secs(3))
            .with_keepalive(None)
            .with_tls(TlsSettings::new("a.pem", "a.key").with_client_ca("ca.pem"));

        assert_eq!(config.max_connections, 500);
        assert_eq!(config.write_timeout, Duration::from_secs(3));
        assert_eq!(config.keepalive, None);
        assert_eq!(config.tls.ca_path, Some(PathBuf::from("ca.pem")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut config = ServerConfig::default();

        // Invalid: zero max_connections
        config.max_connections = 0;
        assert!(config.validate().is_err());

        // Invalid: zero interval
        config.max_connections = 1000;
        config.ping_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        // Invalid: zero keepalive
        config.ping_interval = Duration::from_secs(1);
        config.keepalive = Some(Duration::ZERO);
        assert!(config.validate().is_err());
        config.keepalive = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tls_validation() {
        let mut config = ServerConfig::default();

        config.tls.cert_path = Some(PathBuf::from("cert.pem"));
        assert!(config.validate().is_err());

        config.tls = TlsSettings {
            ca_path: Some(PathBuf::from("ca.pem")),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
