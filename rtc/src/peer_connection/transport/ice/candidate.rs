use std::fmt;

use serde::{Deserialize, Serialize};

use super::candidate_type::RTCIceCandidateType;
use shared::error::{Error, Result};

/// Prefix carried by trickled candidate strings.
pub(crate) const CANDIDATE_PREFIX: &str = "candidate:";

/// Transport protocol of a candidate.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCIceProtocol {
    #[default]
    Unspecified,

    #[serde(rename = "udp")]
    Udp,

    #[serde(rename = "tcp")]
    Tcp,
}

const ICE_PROTOCOL_UDP_STR: &str = "udp";
const ICE_PROTOCOL_TCP_STR: &str = "tcp";

impl From<&str> for RTCIceProtocol {
    fn from(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case(ICE_PROTOCOL_UDP_STR) {
            RTCIceProtocol::Udp
        } else if raw.eq_ignore_ascii_case(ICE_PROTOCOL_TCP_STR) {
            RTCIceProtocol::Tcp
        } else {
            RTCIceProtocol::Unspecified
        }
    }
}

impl fmt::Display for RTCIceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceProtocol::Udp => ICE_PROTOCOL_UDP_STR,
            RTCIceProtocol::Tcp => ICE_PROTOCOL_TCP_STR,
            RTCIceProtocol::Unspecified => crate::peer_connection::configuration::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Role of a TCP candidate.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone, Serialize, Deserialize)]
pub enum RTCIceTcpCandidateType {
    #[default]
    Unspecified,

    #[serde(rename = "active")]
    Active,

    #[serde(rename = "passive")]
    Passive,

    #[serde(rename = "so")]
    SimultaneousOpen,
}

impl From<&str> for RTCIceTcpCandidateType {
    fn from(raw: &str) -> Self {
        match raw {
            "active" => RTCIceTcpCandidateType::Active,
            "passive" => RTCIceTcpCandidateType::Passive,
            "so" => RTCIceTcpCandidateType::SimultaneousOpen,
            _ => RTCIceTcpCandidateType::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceTcpCandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceTcpCandidateType::Active => "active",
            RTCIceTcpCandidateType::Passive => "passive",
            RTCIceTcpCandidateType::SimultaneousOpen => "so",
            RTCIceTcpCandidateType::Unspecified => {
                crate::peer_connection::configuration::UNSPECIFIED_STR
            }
        };
        write!(f, "{s}")
    }
}

/// A transport address a peer can be reached at.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#dom-rtcicecandidate)
/// * [RFC 8839 section 5.1](https://www.rfc-editor.org/rfc/rfc8839#section-5.1)
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCIceCandidate {
    pub foundation: String,
    pub priority: u32,
    pub address: String,
    pub protocol: RTCIceProtocol,
    pub port: u16,
    pub typ: RTCIceCandidateType,
    pub component: u16,
    pub related_address: String,
    pub related_port: u16,
    pub tcp_type: RTCIceTcpCandidateType,
}

impl RTCIceCandidate {
    /// A host candidate for component 1 with its RFC 8445 priority filled in.
    pub fn host(foundation: &str, protocol: RTCIceProtocol, address: &str, port: u16) -> Self {
        let mut c = RTCIceCandidate {
            foundation: foundation.to_owned(),
            address: address.to_owned(),
            protocol,
            port,
            typ: RTCIceCandidateType::Host,
            component: 1,
            ..Default::default()
        };
        c.priority = c.compute_priority();
        c
    }

    /// `(2^24) * type preference + (2^8) * local preference + (256 - component)`
    pub(crate) fn compute_priority(&self) -> u32 {
        (1 << 24) * self.typ.preference()
            + (1 << 8) * u32::from(u16::MAX)
            + (256 - u32::from(self.component.min(256)))
    }

    /// The `a=candidate` value, without the `candidate:` prefix.
    pub fn marshal(&self) -> String {
        let mut val = format!(
            "{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component,
            self.protocol,
            self.priority,
            self.address,
            self.port,
            self.typ
        );

        if self.tcp_type != RTCIceTcpCandidateType::Unspecified {
            val += &format!(" tcptype {}", self.tcp_type);
        }

        if !self.related_address.is_empty() && self.related_port != 0 {
            val += &format!(
                " raddr {} rport {}",
                self.related_address, self.related_port
            );
        }

        val
    }

    /// Parses a candidate attribute value. A leading `candidate:` is accepted.
    pub fn unmarshal(raw: &str) -> Result<Self> {
        let raw = raw.strip_prefix(CANDIDATE_PREFIX).unwrap_or(raw);
        let split: Vec<&str> = raw.split_whitespace().collect();
        if split.len() < 8 {
            return Err(Error::ErrAttributeTooShortIceCandidate);
        }

        let foundation = split[0].to_owned();
        let component: u16 = split[1].parse().map_err(|_| Error::ErrParseComponent)?;
        let protocol = RTCIceProtocol::from(split[2]);
        let priority: u32 = split[3].parse().map_err(|_| Error::ErrParsePriority)?;
        let address = split[4].to_owned();
        let port: u16 = split[5].parse().map_err(|_| Error::ErrParsePort)?;
        if split[6] != "typ" {
            return Err(Error::ErrParseType);
        }
        let typ = RTCIceCandidateType::from(split[7]);
        if typ == RTCIceCandidateType::Unspecified {
            return Err(Error::ErrUnknownCandidateType);
        }

        let mut c = RTCIceCandidate {
            foundation,
            priority,
            address,
            protocol,
            port,
            typ,
            component,
            ..Default::default()
        };

        // the rest are key/value extension pairs
        let mut i = 8;
        while i + 1 < split.len() {
            match split[i] {
                "raddr" => c.related_address = split[i + 1].to_owned(),
                "rport" => {
                    c.related_port =
                        split[i + 1].parse().map_err(|_| Error::ErrParseRelatedAddr)?
                }
                "tcptype" => c.tcp_type = RTCIceTcpCandidateType::from(split[i + 1]),
                _ => {}
            }
            i += 2;
        }

        Ok(c)
    }

    /// The trickle form of this candidate.
    pub fn to_json(&self) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: format!("{CANDIDATE_PREFIX}{}", self.marshal()),
            sdp_mid: Some(String::new()),
            sdp_mline_index: Some(0u16),
            username_fragment: None,
        }
    }
}

impl fmt::Display for RTCIceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}{}",
            self.protocol, self.typ, self.address, self.port, self.related_address,
        )
    }
}

/// Trickle representation of a candidate, as exchanged over signaling.
///
/// An empty `candidate` marks the end of the remote candidates.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_candidate_serialization() {
        let tests = vec![
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: Some("0".to_string()),
                    sdp_mline_index: Some(0),
                    username_fragment: Some("def".to_string()),
                },
                r#"{"candidate":"candidate:abc123","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"def"}"#,
            ),
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: None,
                    sdp_mline_index: None,
                    username_fragment: None,
                },
                r#"{"candidate":"candidate:abc123","sdpMid":null,"sdpMLineIndex":null,"usernameFragment":null}"#,
            ),
        ];

        for (candidate_init, expected_string) in tests {
            let candidate_data = serde_json::to_string(&candidate_init).unwrap();
            assert_eq!(candidate_data, expected_string, "string is not expected");

            let actual = serde_json::from_str::<RTCIceCandidateInit>(&candidate_data).unwrap();
            assert_eq!(actual, candidate_init);
        }
    }

    #[test]
    fn test_ice_candidate_marshal() {
        let host = RTCIceCandidate::host("1", RTCIceProtocol::Udp, "127.0.0.1", 5000);
        assert_eq!(
            host.marshal(),
            format!("1 1 udp {} 127.0.0.1 5000 typ host", host.priority)
        );

        let srflx = RTCIceCandidate {
            foundation: "2".to_owned(),
            priority: 100,
            address: "203.0.113.7".to_owned(),
            protocol: RTCIceProtocol::Udp,
            port: 6000,
            typ: RTCIceCandidateType::Srflx,
            component: 1,
            related_address: "10.0.0.2".to_owned(),
            related_port: 5000,
            tcp_type: RTCIceTcpCandidateType::Unspecified,
        };
        assert_eq!(
            srflx.marshal(),
            "2 1 udp 100 203.0.113.7 6000 typ srflx raddr 10.0.0.2 rport 5000"
        );

        let tcp = RTCIceCandidate {
            protocol: RTCIceProtocol::Tcp,
            tcp_type: RTCIceTcpCandidateType::Passive,
            ..RTCIceCandidate::host("3", RTCIceProtocol::Tcp, "::1", 9)
        };
        assert!(tcp.marshal().ends_with("typ host tcptype passive"));
    }

    #[test]
    fn test_ice_candidate_unmarshal() -> Result<()> {
        let c = RTCIceCandidate::unmarshal(
            "candidate:2 1 UDP 100 203.0.113.7 6000 typ srflx raddr 10.0.0.2 rport 5000 generation 0",
        )?;
        assert_eq!(c.foundation, "2");
        assert_eq!(c.protocol, RTCIceProtocol::Udp);
        assert_eq!(c.typ, RTCIceCandidateType::Srflx);
        assert_eq!(c.related_address, "10.0.0.2");
        assert_eq!(c.related_port, 5000);

        let tests = vec![
            ("1 1 udp 1 127.0.0.1 9 typ", Error::ErrAttributeTooShortIceCandidate),
            ("1 x udp 1 127.0.0.1 9 typ host", Error::ErrParseComponent),
            ("1 1 udp x 127.0.0.1 9 typ host", Error::ErrParsePriority),
            ("1 1 udp 1 127.0.0.1 x typ host", Error::ErrParsePort),
            ("1 1 udp 1 127.0.0.1 9 type host", Error::ErrParseType),
            ("1 1 udp 1 127.0.0.1 9 typ bogus", Error::ErrUnknownCandidateType),
        ];

        for (raw, expected) in tests {
            assert_eq!(RTCIceCandidate::unmarshal(raw).err(), Some(expected), "{raw}");
        }

        Ok(())
    }

    #[test]
    fn test_ice_candidate_to_json_parses_back() -> Result<()> {
        let host = RTCIceCandidate::host("7", RTCIceProtocol::Udp, "127.0.0.1", 40000);
        let init = host.to_json();
        assert!(init.candidate.starts_with(CANDIDATE_PREFIX));
        assert_eq!(RTCIceCandidate::unmarshal(&init.candidate)?, host);

        Ok(())
    }
}
