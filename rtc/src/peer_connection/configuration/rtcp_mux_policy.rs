use std::fmt;

use serde::{Deserialize, Serialize};

/// Affects what ICE candidates are gathered to support non-multiplexed RTCP.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcrtcpmuxpolicy-enum)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCRtcpMuxPolicy {
    #[default]
    Unspecified = 0,

    /// Gather candidates for both RTP and RTCP.
    #[serde(rename = "negotiate")]
    Negotiate = 1,

    /// Gather candidates only for RTP and multiplex RTCP on them.
    #[serde(rename = "require")]
    Require = 2,
}

const RTCP_MUX_POLICY_NEGOTIATE_STR: &str = "negotiate";
const RTCP_MUX_POLICY_REQUIRE_STR: &str = "require";

impl From<&str> for RTCRtcpMuxPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            RTCP_MUX_POLICY_NEGOTIATE_STR => RTCRtcpMuxPolicy::Negotiate,
            RTCP_MUX_POLICY_REQUIRE_STR => RTCRtcpMuxPolicy::Require,
            _ => RTCRtcpMuxPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCRtcpMuxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCRtcpMuxPolicy::Negotiate => RTCP_MUX_POLICY_NEGOTIATE_STR,
            RTCRtcpMuxPolicy::Require => RTCP_MUX_POLICY_REQUIRE_STR,
            RTCRtcpMuxPolicy::Unspecified => super::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCRtcpMuxPolicy {
    /// Maps `Unspecified` to `Require`.
    pub fn resolve(self) -> Self {
        match self {
            RTCRtcpMuxPolicy::Unspecified => RTCRtcpMuxPolicy::Require,
            policy => policy,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_rtcp_mux_policy() {
        let tests = vec![
            ("Unspecified", RTCRtcpMuxPolicy::Unspecified),
            ("negotiate", RTCRtcpMuxPolicy::Negotiate),
            ("require", RTCRtcpMuxPolicy::Require),
        ];

        for (policy_string, expected_policy) in tests {
            assert_eq!(RTCRtcpMuxPolicy::from(policy_string), expected_policy);
            assert_eq!(expected_policy.to_string(), policy_string);
        }
    }

    #[test]
    fn test_rtcp_mux_policy_resolve() {
        assert_eq!(
            RTCRtcpMuxPolicy::Unspecified.resolve(),
            RTCRtcpMuxPolicy::Require
        );
        assert_eq!(
            RTCRtcpMuxPolicy::Negotiate.resolve(),
            RTCRtcpMuxPolicy::Negotiate
        );
    }
}
