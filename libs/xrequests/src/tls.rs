//! TLS client configurations for the socket factory.
//!
//! Native root certificates are loaded once per process and cached, since OS
//! certificate store lookups can be slow on some platforms.

use crate::config::TlsRootConfig;
use crate::error::RequestError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::{Arc, OnceLock};

/// Cached native root certificates; empty when the OS store had none.
static NATIVE_ROOTS_CACHE: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_certs_inner() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }

    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

/// Native root certificates, loaded on first call.
#[must_use]
pub fn native_root_certs() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS_CACHE
        .get_or_init(load_native_certs_inner)
        .as_slice()
}

/// The process-wide default crypto provider if one is installed, otherwise a
/// fresh aws-lc-rs provider. Never installs anything globally.
#[must_use]
pub fn get_crypto_provider() -> Arc<CryptoProvider> {
    CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn root_store(roots: TlsRootConfig) -> Result<RootCertStore, RequestError> {
    let mut store = RootCertStore::empty();
    match roots {
        TlsRootConfig::WebPki => {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        TlsRootConfig::Native => {
            let certs = native_root_certs();
            if certs.is_empty() {
                return Err(RequestError::Tls(
                    "no native root CA certificates found in OS certificate store".into(),
                ));
            }

            let (added, ignored) = store.add_parsable_certificates(certs.iter().cloned());
            if ignored > 0 {
                tracing::warn!(added, ignored, "some native root certificates could not be parsed");
            }
            if added == 0 {
                return Err(RequestError::Tls(
                    format!(
                        "no valid native root CA certificates parsed (found {}, all failed to parse)",
                        certs.len()
                    )
                    .into(),
                ));
            }
        }
    }
    Ok(store)
}

/// Build a config that validates the chain against `roots` and checks the
/// hostname.
///
/// # Errors
/// [`RequestError::Tls`] if no usable root certificates are available.
pub fn verified_client_config(roots: TlsRootConfig) -> Result<ClientConfig, RequestError> {
    let config = ClientConfig::builder_with_provider(get_crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store(roots)?)
        .with_no_client_auth();
    Ok(config)
}

/// Build a config that accepts any certificate for any name.
///
/// Handshake signatures are still checked so the session keys belong to
/// whoever presented the certificate.
///
/// # Errors
/// [`RequestError::Tls`] if the provider rejects the default protocol versions.
pub fn unverified_client_config() -> Result<ClientConfig, RequestError> {
    let provider = get_crypto_provider();
    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerifier { provider }))
        .with_no_client_auth();
    Ok(config)
}

/// Skips certificate and hostname validation.
#[derive(Debug)]
struct NoVerifier {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// The pair of client configs a session picks from per request.
#[derive(Clone)]
pub struct TlsConfigs {
    verified: Arc<ClientConfig>,
    unverified: Arc<ClientConfig>,
}

impl TlsConfigs {
    /// # Errors
    /// [`RequestError::Tls`] if either config cannot be built.
    pub fn new(roots: TlsRootConfig) -> Result<Self, RequestError> {
        Ok(Self {
            verified: Arc::new(verified_client_config(roots)?),
            unverified: Arc::new(unverified_client_config()?),
        })
    }

    #[must_use]
    pub fn select(&self, verify: bool) -> Arc<ClientConfig> {
        if verify {
            Arc::clone(&self.verified)
        } else {
            tracing::warn!("TLS certificate verification disabled for this connection");
            Arc::clone(&self.unverified)
        }
    }
}

impl std::fmt::Debug for TlsConfigs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfigs").finish_non_exhaustive()
    }
}
