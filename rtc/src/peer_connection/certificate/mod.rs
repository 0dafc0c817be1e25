//! X.509 certificates authenticating the handshake transport.
//!
//! Every connection owns at least one certificate. Its SHA-256 fingerprint is
//! advertised in each generated description with `a=fingerprint` and checked
//! against the remote peer's certificate when the handshake transport starts.
//!
//! ```
//! use rtc_peer::peer_connection::certificate::RTCCertificate;
//! use rcgen::KeyPair;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
//! let certificate = RTCCertificate::from_key_pair(key_pair)?;
//!
//! for fp in certificate.get_fingerprints() {
//!     println!("a=fingerprint:{} {}", fp.algorithm, fp.value);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::SystemTime;

use rcgen::{CertificateParams, KeyPair};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, Ed25519KeyPair};
use sha2::{Digest, Sha256};

use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use shared::error::{Error, Result};
use shared::util::math_rand_alpha;

/// Fingerprint hash advertised in `a=fingerprint`.
pub(crate) const FINGERPRINT_ALGORITHM: &str = "sha-256";

/// Private key algorithm backing a certificate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CertificateKeyKind {
    Ed25519,
    EcdsaP256,
}

/// Certificate plus private key used by the handshake transport.
///
/// Two certificates are equal when their DER encodings are equal.
#[derive(Clone, Debug)]
pub struct RTCCertificate {
    pub(crate) certificate: Vec<u8>,
    pub(crate) serialized_pem: String,
    pub(crate) kind: CertificateKeyKind,
    pub(crate) expires: SystemTime,
}

impl PartialEq for RTCCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.certificate == other.certificate
    }
}

impl RTCCertificate {
    /// Self-signs `params` with `key_pair` without checking the validity window.
    pub fn from_params(params: CertificateParams, key_pair: KeyPair) -> Result<Self> {
        let serialized_key_der = key_pair.serialize_der();

        let kind = if key_pair.algorithm() == &rcgen::PKCS_ED25519 {
            Ed25519KeyPair::from_pkcs8(&serialized_key_der)
                .map_err(|e| Error::Other(e.to_string()))?;
            CertificateKeyKind::Ed25519
        } else if key_pair.algorithm() == &rcgen::PKCS_ECDSA_P256_SHA256 {
            EcdsaKeyPair::from_pkcs8(
                &ECDSA_P256_SHA256_ASN1_SIGNING,
                &serialized_key_der,
                &SystemRandom::new(),
            )
            .map_err(|e| Error::Other(e.to_string()))?;
            CertificateKeyKind::EcdsaP256
        } else {
            return Err(Error::ErrPrivateKeyType);
        };

        let expires = SystemTime::from(params.not_after);
        let cert = params.self_signed(&key_pair)?;
        let serialized_pem = format!("{}{}", key_pair.serialize_pem(), cert.pem());

        Ok(RTCCertificate {
            certificate: cert.der().to_vec(),
            serialized_pem,
            kind,
            expires,
        })
    }

    /// Generates a fresh self-signed certificate for `key_pair` with a random
    /// subject name.
    pub fn from_key_pair(key_pair: KeyPair) -> Result<Self> {
        if !(key_pair.is_compatible(&rcgen::PKCS_ED25519)
            || key_pair.is_compatible(&rcgen::PKCS_ECDSA_P256_SHA256))
        {
            return Err(Error::ErrPrivateKeyType);
        }

        let params = CertificateParams::new(vec![math_rand_alpha(16)])?;
        RTCCertificate::from_params(params, key_pair)
    }

    /// Builds a certificate from caller supplied X.509 parameters.
    ///
    /// Fails with [`Error::ErrCertificateExpired`] when `params.not_after` is
    /// not in the future.
    pub fn from_existing(key_pair: KeyPair, params: CertificateParams) -> Result<Self> {
        let expires = SystemTime::from(params.not_after);
        if expires <= SystemTime::now() {
            return Err(Error::ErrCertificateExpired);
        }
        RTCCertificate::from_params(params, key_pair)
    }

    /// Returns the SHA-256 fingerprint of the certificate.
    pub fn get_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        vec![RTCDtlsFingerprint {
            algorithm: FINGERPRINT_ALGORITHM.to_owned(),
            value: fingerprint_of(&self.certificate),
        }]
    }

    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    pub fn kind(&self) -> CertificateKeyKind {
        self.kind
    }

    /// DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.certificate
    }

    /// Private key followed by the certificate, both PEM encoded.
    pub fn serialize_pem(&self) -> &str {
        &self.serialized_pem
    }

    pub(crate) fn is_expired(&self, now: SystemTime) -> bool {
        self.expires <= now
    }
}

/// Upper-case hex SHA-256 digest of `der`, bytes separated by `:`.
pub(crate) fn fingerprint_of(der: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(der);
    h.finalize()
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<String>>()
        .join(":")
}
