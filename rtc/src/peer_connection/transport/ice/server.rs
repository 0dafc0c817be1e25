use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use shared::error::{Error, Result};

/// How the `credential` of an [`RTCIceServer`] is interpreted.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceCredentialType {
    #[default]
    Unspecified,

    /// `credential` is a long-term password.
    #[serde(rename = "password")]
    Password,

    /// `credential` is an OAuth token, optionally an [`RTCOAuthCredential`]
    /// written as `"<mac_key>:<access_token>"`.
    #[serde(rename = "oauth")]
    Oauth,
}

const ICE_CREDENTIAL_TYPE_PASSWORD_STR: &str = "password";
const ICE_CREDENTIAL_TYPE_OAUTH_STR: &str = "oauth";

impl From<&str> for RTCIceCredentialType {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_CREDENTIAL_TYPE_PASSWORD_STR => RTCIceCredentialType::Password,
            ICE_CREDENTIAL_TYPE_OAUTH_STR => RTCIceCredentialType::Oauth,
            _ => RTCIceCredentialType::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceCredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceCredentialType::Password => ICE_CREDENTIAL_TYPE_PASSWORD_STR,
            RTCIceCredentialType::Oauth => ICE_CREDENTIAL_TYPE_OAUTH_STR,
            RTCIceCredentialType::Unspecified => {
                crate::peer_connection::configuration::UNSPECIFIED_STR
            }
        };
        write!(f, "{s}")
    }
}

/// OAuth credential for a TURN server, RFC 7635.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCOAuthCredential {
    pub mac_key: String,
    pub access_token: String,
}

impl RTCOAuthCredential {
    /// Splits `"<mac_key>:<access_token>"`.
    pub fn parse(credential: &str) -> Result<Self> {
        let (mac_key, access_token) = credential
            .split_once(':')
            .ok_or(Error::ErrTurnCredentials)?;
        if mac_key.is_empty() || access_token.is_empty() {
            return Err(Error::ErrTurnCredentials);
        }
        Ok(RTCOAuthCredential {
            mac_key: mac_key.to_owned(),
            access_token: access_token.to_owned(),
        })
    }
}

impl fmt::Display for RTCOAuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.mac_key, self.access_token)
    }
}

/// URL scheme of an ICE server.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCIceServerScheme {
    Stun,
    Stuns,
    Turn,
    Turns,
}

impl RTCIceServerScheme {
    fn parse(scheme: &str) -> Result<Self> {
        match scheme {
            "stun" => Ok(RTCIceServerScheme::Stun),
            "stuns" => Ok(RTCIceServerScheme::Stuns),
            "turn" => Ok(RTCIceServerScheme::Turn),
            "turns" => Ok(RTCIceServerScheme::Turns),
            _ => Err(Error::ErrSchemeType),
        }
    }

    pub fn is_relay(self) -> bool {
        matches!(self, RTCIceServerScheme::Turn | RTCIceServerScheme::Turns)
    }
}

/// A STUN or TURN server used to discover candidates.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#dom-rtciceserver)
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceServer {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub credential_type: RTCIceCredentialType,
}

/// Parses one ICE server URL and returns its scheme.
pub(crate) fn parse_ice_url(raw: &str) -> Result<(RTCIceServerScheme, Url)> {
    let url = Url::parse(raw)?;
    let scheme = RTCIceServerScheme::parse(url.scheme())?;
    // stun:host:port is an opaque path to the url parser
    let host = url
        .host_str()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| url.path().to_owned());
    let name = host
        .trim_start_matches('[')
        .split([':', ']'])
        .next()
        .unwrap_or("");
    if name.is_empty() {
        return Err(Error::ErrHost);
    }
    Ok((scheme, url))
}

impl RTCIceServer {
    /// Checks every URL and, for relay URLs, the credentials.
    pub(crate) fn validate(&self) -> Result<()> {
        for raw in &self.urls {
            let (scheme, _) = parse_ice_url(raw)?;
            if !scheme.is_relay() {
                continue;
            }

            if self.username.is_empty() || self.credential.is_empty() {
                return Err(Error::ErrNoTurnCredentials);
            }
        }

        Ok(())
    }

    /// The OAuth credential, when `credential_type` is `Oauth` and the
    /// credential has the `"<mac_key>:<access_token>"` form. Any other
    /// non-empty credential is passed to the relay as an opaque token.
    pub fn oauth_credential(&self) -> Option<RTCOAuthCredential> {
        if self.credential_type != RTCIceCredentialType::Oauth {
            return None;
        }
        RTCOAuthCredential::parse(&self.credential).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_server_validate_success() {
        let tests = vec![
            (
                RTCIceServer {
                    urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                    username: "unittest".to_owned(),
                    credential: "placeholder".to_owned(),
                    credential_type: RTCIceCredentialType::Password,
                },
                true,
            ),
            (
                RTCIceServer {
                    urls: vec!["turn:[2001:db8:1234:5678::1]?transport=udp".to_owned()],
                    username: "unittest".to_owned(),
                    credential: "placeholder".to_owned(),
                    credential_type: RTCIceCredentialType::Password,
                },
                true,
            ),
            (
                RTCIceServer {
                    urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                    username: "unittest".to_owned(),
                    credential: "WmtzanB3ZW9peFhtdm42NzUzNG06NTY1NTQ3MDk=".to_owned(),
                    credential_type: RTCIceCredentialType::Oauth,
                },
                true,
            ),
        ];

        for (ice_server, expected_validate) in tests {
            let result = ice_server.validate();
            assert_eq!(result.is_ok(), expected_validate, "{ice_server:?}");
        }
    }

    #[test]
    fn test_ice_server_validate_failure() {
        let tests = vec![
            (
                RTCIceServer {
                    urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                    ..Default::default()
                },
                Error::ErrNoTurnCredentials,
            ),
            (
                RTCIceServer {
                    urls: vec!["turn:192.158.29.39?transport=udp".to_owned()],
                    username: "unittest".to_owned(),
                    credential: String::new(),
                    credential_type: RTCIceCredentialType::Password,
                },
                Error::ErrNoTurnCredentials,
            ),
            (
                RTCIceServer {
                    urls: vec!["turns:192.158.29.39".to_owned()],
                    username: "unittest".to_owned(),
                    credential: String::new(),
                    credential_type: RTCIceCredentialType::Oauth,
                },
                Error::ErrNoTurnCredentials,
            ),
            (
                RTCIceServer {
                    urls: vec!["http://example.com".to_owned()],
                    ..Default::default()
                },
                Error::ErrSchemeType,
            ),
        ];

        for (ice_server, expected_err) in tests {
            assert_eq!(ice_server.validate(), Err(expected_err), "{ice_server:?}");
        }
    }

    #[test]
    fn test_ice_server_url_without_scheme() {
        let server = RTCIceServer {
            urls: vec!["stun.l.google.com:19302".to_owned()],
            ..Default::default()
        };
        let err = server.validate().unwrap_err();
        assert_eq!(err.kind(), shared::error::ErrorKind::Syntax);
    }

    #[test]
    fn test_stun_url_needs_no_credentials() {
        let server = RTCIceServer {
            urls: vec![
                "stun:stun.l.google.com:19302".to_owned(),
                "stuns:stun.example.org".to_owned(),
            ],
            ..Default::default()
        };
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_oauth_credential() {
        let server = RTCIceServer {
            urls: vec!["turn:example.org".to_owned()],
            username: "user".to_owned(),
            credential: "mac:token".to_owned(),
            credential_type: RTCIceCredentialType::Oauth,
        };
        let oauth = server.oauth_credential().unwrap();
        assert_eq!(oauth.mac_key, "mac");
        assert_eq!(oauth.access_token, "token");
        assert_eq!(oauth.to_string(), "mac:token");

        let opaque = RTCIceServer {
            credential: "WmtzanB3ZW9peFhtdm42NzUzNG0=".to_owned(),
            ..server
        };
        assert!(opaque.validate().is_ok());
        assert_eq!(opaque.oauth_credential(), None);
    }

    #[test]
    fn test_ice_server_json() {
        let server: RTCIceServer = serde_json::from_str(
            r#"{"urls":["turn:example.org"],"username":"u","credential":"c","credentialType":"password"}"#,
        )
        .unwrap();
        assert_eq!(server.credential_type, RTCIceCredentialType::Password);
        assert!(server.validate().is_ok());
    }
}
