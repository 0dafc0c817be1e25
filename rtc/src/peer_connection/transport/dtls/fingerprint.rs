use serde::{Deserialize, Serialize};

use crate::peer_connection::certificate::{FINGERPRINT_ALGORITHM, fingerprint_of};
use shared::error::{Error, Result};

/// Hash of a certificate as advertised in `a=fingerprint`.
///
/// The value is colon separated hex. Comparison ignores case.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCDtlsFingerprint {
    /// Hash function name, e.g. `sha-256`.
    pub algorithm: String,

    pub value: String,
}

impl RTCDtlsFingerprint {
    /// Parses the value of an `a=fingerprint` attribute.
    pub(crate) fn parse(attribute_value: &str) -> Result<Self> {
        let mut parts = attribute_value.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(algorithm), Some(value), None) => Ok(RTCDtlsFingerprint {
                algorithm: algorithm.to_ascii_lowercase(),
                value: value.to_owned(),
            }),
            _ => Err(Error::ErrSessionDescriptionInvalidFingerprint),
        }
    }

    /// The `a=fingerprint` attribute value.
    pub(crate) fn to_attribute_value(&self) -> String {
        format!("{} {}", self.algorithm, self.value)
    }
}

/// Checks `remote_cert` against the fingerprints the remote advertised.
pub(crate) fn validate_fingerprint(
    fingerprints: &[RTCDtlsFingerprint],
    remote_cert: &[u8],
) -> Result<()> {
    let remote_value = fingerprint_of(remote_cert);
    for fp in fingerprints {
        if !fp.algorithm.eq_ignore_ascii_case(FINGERPRINT_ALGORITHM) {
            return Err(Error::ErrUnsupportedFingerprintAlgorithm);
        }
        if remote_value.eq_ignore_ascii_case(&fp.value) {
            return Ok(());
        }
    }

    Err(Error::ErrNoMatchingCertificateFingerprint)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fingerprint_parse() {
        let tests = vec![
            ("sha-256 AB:CD", Ok(("sha-256", "AB:CD"))),
            ("SHA-256 ab:cd", Ok(("sha-256", "ab:cd"))),
            ("sha-256", Err(Error::ErrSessionDescriptionInvalidFingerprint)),
            ("sha-256 AB CD", Err(Error::ErrSessionDescriptionInvalidFingerprint)),
        ];

        for (raw, expected) in tests {
            let actual = RTCDtlsFingerprint::parse(raw);
            match expected {
                Ok((algorithm, value)) => {
                    let fp = actual.unwrap();
                    assert_eq!(fp.algorithm, algorithm);
                    assert_eq!(fp.value, value);
                    assert_eq!(RTCDtlsFingerprint::parse(&fp.to_attribute_value()).unwrap(), fp);
                }
                Err(err) => assert_eq!(actual, Err(err), "{raw}"),
            }
        }
    }

    #[test]
    fn test_validate_fingerprint() {
        let cert = b"not really a certificate";
        let good = RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: fingerprint_of(cert).to_lowercase(),
        };
        let other = RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: fingerprint_of(b"another"),
        };
        let md5 = RTCDtlsFingerprint {
            algorithm: "md5".to_owned(),
            value: "00".to_owned(),
        };

        assert_eq!(validate_fingerprint(&[good.clone()], cert), Ok(()));
        assert_eq!(validate_fingerprint(&[other.clone(), good], cert), Ok(()));
        assert_eq!(
            validate_fingerprint(&[other], cert),
            Err(Error::ErrNoMatchingCertificateFingerprint)
        );
        assert_eq!(
            validate_fingerprint(&[md5], cert),
            Err(Error::ErrUnsupportedFingerprintAlgorithm)
        );
        assert_eq!(
            validate_fingerprint(&[], cert),
            Err(Error::ErrNoMatchingCertificateFingerprint)
        );
    }
}
