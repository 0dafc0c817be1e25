use std::fmt;

use sdp::description::session::SessionDescription;
use serde::{Deserialize, Serialize};

use crate::peer_connection::sdp::ATTR_KEY_SETUP;

/// Which side of the handshake this endpoint plays.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#dom-rtcdtlsrole)
/// * [RFC 5763 section 5](https://www.rfc-editor.org/rfc/rfc5763#section-5)
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCDtlsRole {
    #[default]
    Unspecified = 0,

    /// Decided later; advertised as `a=setup:actpass`.
    #[serde(rename = "auto")]
    Auto = 1,

    /// Initiates the handshake; advertised as `a=setup:active`.
    #[serde(rename = "client")]
    Client = 2,

    /// Waits for the handshake; advertised as `a=setup:passive`.
    #[serde(rename = "server")]
    Server = 3,
}

/// An answerer initiates the handshake unless configured otherwise.
pub(crate) const DEFAULT_DTLS_ROLE_ANSWER: RTCDtlsRole = RTCDtlsRole::Client;

/// An offerer leaves the choice to the answerer.
pub(crate) const DEFAULT_DTLS_ROLE_OFFER: RTCDtlsRole = RTCDtlsRole::Auto;

const SETUP_ACTIVE: &str = "active";
const SETUP_PASSIVE: &str = "passive";
const SETUP_ACTPASS: &str = "actpass";

impl fmt::Display for RTCDtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCDtlsRole::Auto => "auto",
            RTCDtlsRole::Client => "client",
            RTCDtlsRole::Server => "server",
            RTCDtlsRole::Unspecified => crate::peer_connection::configuration::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Reads the first `a=setup` of the description. A missing attribute means
/// `Auto`.
impl From<&SessionDescription> for RTCDtlsRole {
    fn from(session_description: &SessionDescription) -> Self {
        let session_level = session_description.attributes.iter();
        let media_level = session_description
            .media_descriptions
            .iter()
            .flat_map(|m| m.attributes.iter());

        for attribute in session_level.chain(media_level) {
            if attribute.key == ATTR_KEY_SETUP {
                return RTCDtlsRole::from_setup(attribute.value.as_deref().unwrap_or_default());
            }
        }

        RTCDtlsRole::Auto
    }
}

impl RTCDtlsRole {
    pub(crate) fn from_setup(value: &str) -> Self {
        match value {
            SETUP_ACTIVE => RTCDtlsRole::Client,
            SETUP_PASSIVE => RTCDtlsRole::Server,
            _ => RTCDtlsRole::Auto,
        }
    }

    /// Value for the `a=setup` attribute.
    pub(crate) fn to_setup(self) -> &'static str {
        match self {
            RTCDtlsRole::Client => SETUP_ACTIVE,
            RTCDtlsRole::Server => SETUP_PASSIVE,
            RTCDtlsRole::Auto | RTCDtlsRole::Unspecified => SETUP_ACTPASS,
        }
    }

    /// Local role given the role the remote advertised.
    pub(crate) fn complement(self) -> Self {
        match self {
            RTCDtlsRole::Client => RTCDtlsRole::Server,
            RTCDtlsRole::Server => RTCDtlsRole::Client,
            // an actpass answer is invalid; act as the passive side
            RTCDtlsRole::Auto | RTCDtlsRole::Unspecified => RTCDtlsRole::Server,
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use shared::error::{Error, Result};

    #[test]
    fn test_dtls_role_string() {
        let tests = vec![
            (RTCDtlsRole::Unspecified, "Unspecified", "actpass"),
            (RTCDtlsRole::Auto, "auto", "actpass"),
            (RTCDtlsRole::Client, "client", "active"),
            (RTCDtlsRole::Server, "server", "passive"),
        ];

        for (role, expected_string, expected_setup) in tests {
            assert_eq!(role.to_string(), expected_string);
            assert_eq!(role.to_setup(), expected_setup);
        }
    }

    #[test]
    fn test_dtls_role_complement() {
        assert_eq!(RTCDtlsRole::Client.complement(), RTCDtlsRole::Server);
        assert_eq!(RTCDtlsRole::Server.complement(), RTCDtlsRole::Client);
        assert_eq!(RTCDtlsRole::Auto.complement(), RTCDtlsRole::Server);
    }

    #[test]
    fn test_dtls_role_from_remote_sdp() -> Result<()> {
        const NO_MEDIA: &str = "v=0\r\n\
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n";

        const MEDIA_NO_SETUP: &str = "v=0\r\n\
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
m=application 47299 DTLS/SCTP 5000\r\n\
c=IN IP4 192.168.20.129\r\n";

        let with_setup = |value: &str| format!("{MEDIA_NO_SETUP}a=setup:{value}\r\n");

        let tests = vec![
            ("No MediaDescriptions", NO_MEDIA.to_owned(), RTCDtlsRole::Auto),
            ("MediaDescription, no setup", MEDIA_NO_SETUP.to_owned(), RTCDtlsRole::Auto),
            ("MediaDescription, setup:actpass", with_setup("actpass"), RTCDtlsRole::Auto),
            ("MediaDescription, setup:passive", with_setup("passive"), RTCDtlsRole::Server),
            ("MediaDescription, setup:active", with_setup("active"), RTCDtlsRole::Client),
        ];

        for (name, session_description_str, expected_role) in tests {
            let mut reader = Cursor::new(session_description_str.as_bytes());
            let session_description = SessionDescription::unmarshal(&mut reader)
                .map_err(|e| Error::OtherSdpErr(e.to_string()))?;
            assert_eq!(
                RTCDtlsRole::from(&session_description),
                expected_role,
                "{name} failed"
            );
        }

        Ok(())
    }
}
