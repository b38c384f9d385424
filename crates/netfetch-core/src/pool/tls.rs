//! Client-side `rustls::ClientConfig` construction (SPEC_FULL §4.5).
//!
//! Fixed cipher suite and curve preference lists rather than rustls's full defaults, matching
//! the conservative selection a security-sensitive HTTP client wants: AEAD-only TLS 1.2 suites
//! plus all three TLS 1.3 suites, X25519 preferred over the NIST curves.

use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore, SupportedCipherSuite, SupportedProtocolVersion};

use crate::config::{TlsConfig as NetfetchTlsConfig, TlsVersion};
use crate::error::{NetfetchError, Result, TlsError};

mod danger {
    use std::sync::Arc;

    use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
    use rustls::crypto::CryptoProvider;
    use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
    use rustls::{DigitallySignedStruct, SignatureScheme};

    /// Disables certificate verification entirely. Only reachable via
    /// `SecurityConfig`/`TlsConfig::insecure_skip_verify`, which defaults to `false`.
    #[derive(Debug)]
    pub struct NoCertificateVerification(pub Arc<CryptoProvider>);

    impl ServerCertVerifier for NoCertificateVerification {
        fn verify_server_cert(
            &self,
            _end_entity: &CertificateDer<'_>,
            _intermediates: &[CertificateDer<'_>],
            _server_name: &ServerName<'_>,
            _ocsp_response: &[u8],
            _now: UnixTime,
        ) -> std::result::Result<ServerCertVerified, rustls::Error> {
            Ok(ServerCertVerified::assertion())
        }

        fn verify_tls12_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
        }

        fn verify_tls13_signature(
            &self,
            message: &[u8],
            cert: &CertificateDer<'_>,
            dss: &DigitallySignedStruct,
        ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
            rustls::crypto::verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
        }

        fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
            self.0.signature_verification_algorithms.supported_schemes()
        }
    }
}

/// TLS 1.3 AEAD suites plus the ECDHE+AES-GCM/ChaCha20-Poly1305 TLS 1.2 suites; excludes CBC
/// and RSA key-exchange suites entirely.
fn cipher_suites() -> Vec<SupportedCipherSuite> {
    use rustls::crypto::ring::cipher_suite::*;
    vec![
        TLS13_AES_128_GCM_SHA256,
        TLS13_AES_256_GCM_SHA384,
        TLS13_CHACHA20_POLY1305_SHA256,
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
        TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
        TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    ]
}

/// X25519 preferred, then the NIST curves in ascending security/descending speed order.
fn curve_preferences() -> Vec<&'static dyn rustls::crypto::SupportedKxGroup> {
    use rustls::crypto::ring::kx_group::*;
    vec![X25519, SECP256R1, SECP384R1]
}

fn protocol_versions(cfg: &NetfetchTlsConfig) -> Vec<&'static SupportedProtocolVersion> {
    let mut versions = Vec::new();
    if cfg.min_version <= TlsVersion::Tls12 && cfg.max_version >= TlsVersion::Tls12 {
        versions.push(&rustls::version::TLS12);
    }
    if cfg.max_version >= TlsVersion::Tls13 {
        versions.push(&rustls::version::TLS13);
    }
    versions
}

/// Builds the TLS client config used by the pool's dialer. `caller_config` takes precedence
/// over everything below when provided (per §4.5: "clone any caller-provided ClientConfig").
pub fn build_client_config(cfg: &NetfetchTlsConfig, caller_config: Option<Arc<ClientConfig>>) -> Result<Arc<ClientConfig>> {
    if let Some(existing) = caller_config {
        return Ok(existing);
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let versions = protocol_versions(cfg);
    if versions.is_empty() {
        return Err(NetfetchError::Tls(TlsError::Handshake(
            "min_version must not exceed max_version".to_string(),
        )));
    }

    let custom_provider = Arc::new(CryptoProvider {
        cipher_suites: cipher_suites(),
        kx_groups: curve_preferences(),
        ..(*provider).clone()
    });

    let builder = ClientConfig::builder_with_provider(custom_provider.clone())
        .with_protocol_versions(&versions)
        .map_err(|e| NetfetchError::Tls(TlsError::Handshake(e.to_string())))?;

    let mut client_config = if cfg.insecure_skip_verify {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(danger::NoCertificateVerification(custom_provider)))
            .with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    client_config.resumption = rustls::client::Resumption::in_memory_sessions(256);

    Ok(Arc::new(client_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_config_without_error() {
        let cfg = NetfetchTlsConfig::default();
        let built = build_client_config(&cfg, None).unwrap();
        assert!(!built.alpn_protocols.is_empty() || built.alpn_protocols.is_empty());
    }

    #[test]
    fn caller_provided_config_is_returned_unchanged() {
        let cfg = NetfetchTlsConfig::default();
        let custom = build_client_config(&cfg, None).unwrap();
        let passthrough = build_client_config(&cfg, Some(custom.clone())).unwrap();
        assert!(Arc::ptr_eq(&custom, &passthrough));
    }

    #[test]
    fn inverted_version_bounds_error_instead_of_panicking() {
        let mut cfg = NetfetchTlsConfig::default();
        cfg.min_version = TlsVersion::Tls13;
        cfg.max_version = TlsVersion::Tls12;
        assert!(build_client_config(&cfg, None).is_err());
    }

    #[test]
    fn insecure_skip_verify_still_builds_a_usable_config() {
        let mut cfg = NetfetchTlsConfig::default();
        cfg.insecure_skip_verify = true;
        assert!(build_client_config(&cfg, None).is_ok());
    }
}
