use std::fmt;

use serde::{Deserialize, Serialize};

/// Defines the ICE candidate policy used to gather local candidates.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcicetransportpolicy-enum)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCIceTransportPolicy {
    #[default]
    Unspecified = 0,

    /// Any type of candidate may be gathered.
    #[serde(rename = "all")]
    All = 1,

    /// Only media relay candidates may be gathered.
    #[serde(rename = "relay")]
    Relay = 2,
}

const ICE_TRANSPORT_POLICY_RELAY_STR: &str = "relay";
const ICE_TRANSPORT_POLICY_ALL_STR: &str = "all";

impl From<&str> for RTCIceTransportPolicy {
    fn from(raw: &str) -> Self {
        match raw {
            ICE_TRANSPORT_POLICY_RELAY_STR => RTCIceTransportPolicy::Relay,
            ICE_TRANSPORT_POLICY_ALL_STR => RTCIceTransportPolicy::All,
            _ => RTCIceTransportPolicy::Unspecified,
        }
    }
}

impl fmt::Display for RTCIceTransportPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceTransportPolicy::Relay => ICE_TRANSPORT_POLICY_RELAY_STR,
            RTCIceTransportPolicy::All => ICE_TRANSPORT_POLICY_ALL_STR,
            RTCIceTransportPolicy::Unspecified => super::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCIceTransportPolicy {
    /// Maps `Unspecified` to `All`.
    pub fn resolve(self) -> Self {
        match self {
            RTCIceTransportPolicy::Unspecified => RTCIceTransportPolicy::All,
            policy => policy,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_ice_transport_policy() {
        let tests = vec![
            ("relay", RTCIceTransportPolicy::Relay),
            ("all", RTCIceTransportPolicy::All),
        ];

        for (policy_string, expected_policy) in tests {
            assert_eq!(RTCIceTransportPolicy::from(policy_string), expected_policy);
            assert_eq!(expected_policy.to_string(), policy_string);
        }
    }

    #[test]
    fn test_ice_transport_policy_resolve() {
        assert_eq!(
            RTCIceTransportPolicy::Unspecified.resolve(),
            RTCIceTransportPolicy::All
        );
        assert_eq!(
            RTCIceTransportPolicy::Relay.resolve(),
            RTCIceTransportPolicy::Relay
        );
    }
}
