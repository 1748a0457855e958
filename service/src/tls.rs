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

//! TLS listener setup
//!
//! Basestations always talk TLS. Depending on [`TlsSettings`] the acceptor
//! presents the configured chain, additionally verifies client certificates
//! against a CA, or falls back to a freshly generated self-signed certificate.

use crate::{BssciError, Result, TlsSettings};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{RootCertStore, ServerConfig};
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

/// Subject names of the generated fallback certificate
pub const SELF_SIGNED_NAMES: &[&str] = &["localhost", "bssci-service-center"];

/// Build the acceptor for the listener
pub async fn build_acceptor(settings: &TlsSettings) -> Result<TlsAcceptor> {
    let (certs, key) = match (&settings.cert_path, &settings.key_path) {
        (Some(cert_path), Some(key_path)) => {
            let certs = parse_certificates(&read_pem(cert_path).await?)?;
            if certs.is_empty() {
                return Err(BssciError::Tls(format!(
                    "no certificates found in {}",
                    cert_path.display()
                )));
            }
            let key = parse_private_key(&read_pem(key_path).await?)?;
            (certs, key)
        }
        (None, None) => {
            warn!("No TLS certificate configured, using a self-signed certificate");
            self_signed()?
        }
        _ => {
            return Err(BssciError::Config(
                "tls cert_path and key_path must be configured together".to_string(),
            ));
        }
    };

    let builder = ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| BssciError::Tls(format!("protocol versions: {e}")))?;

    let config = match &settings.ca_path {
        Some(ca_path) => {
            let ca_certs = parse_certificates(&read_pem(ca_path).await?)?;
            if ca_certs.is_empty() {
                return Err(BssciError::Tls(format!(
                    "no CA certificates found in {}",
                    ca_path.display()
                )));
            }
            let mut root_store = RootCertStore::empty();
            for cert in ca_certs {
                root_store
                    .add(cert)
                    .map_err(|e| BssciError::Tls(format!("failed to add CA certificate: {e}")))?;
            }
            let verifier = rustls::server::WebPkiClientVerifier::builder_with_provider(
                Arc::new(root_store),
                Arc::new(rustls::crypto::ring::default_provider()),
            )
            .build()
            .map_err(|e| BssciError::Tls(format!("client verifier error: {e}")))?;

            info!(ca = %ca_path.display(), "Requiring basestation client certificates");
            builder
                .with_client_cert_verifier(verifier)
                .with_single_cert(certs, key)
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key),
    }
    .map_err(|e| BssciError::Tls(format!("server config error: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Generate a self-signed certificate chain and key
pub fn self_signed() -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let names = SELF_SIGNED_NAMES.iter().map(|name| name.to_string()).collect::<Vec<_>>();
    let certified = rcgen::generate_simple_self_signed(names)
        .map_err(|e| BssciError::Tls(format!("failed to generate certificate: {e}")))?;

    let certs = parse_certificates(certified.cert.pem().as_bytes())?;
    let key = parse_private_key(certified.key_pair.serialize_pem().as_bytes())?;
    Ok((certs, key))
}

async fn read_pem(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| BssciError::Tls(format!("failed to read {}: {e}", path.display())))
}

/// Parse PEM-encoded certificates
fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| BssciError::Tls(format!("failed to parse certificates: {e}")))
}

/// Parse a PEM-encoded private key
fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| BssciError::Tls(format!("failed to parse private key: {e}")))
}
