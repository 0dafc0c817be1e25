use std::fmt;

use crate::peer_connection::configuration::UNSPECIFIED_STR;
use serde::{Deserialize, Serialize};

/// Role a session description plays in the offer/answer exchange.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcsdptype)
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum RTCSdpType {
    #[default]
    Unspecified = 0,

    /// Starts a negotiation round.
    #[serde(rename = "offer")]
    Offer,

    /// Provisional answer; the round stays open.
    #[serde(rename = "pranswer")]
    Pranswer,

    /// Final answer; closes the round.
    #[serde(rename = "answer")]
    Answer,

    /// Cancels the pending offer. Carries no description body.
    #[serde(rename = "rollback")]
    Rollback,
}

const SDP_TYPE_OFFER_STR: &str = "offer";
const SDP_TYPE_PRANSWER_STR: &str = "pranswer";
const SDP_TYPE_ANSWER_STR: &str = "answer";
const SDP_TYPE_ROLLBACK_STR: &str = "rollback";

impl From<&str> for RTCSdpType {
    fn from(raw: &str) -> Self {
        match raw {
            SDP_TYPE_OFFER_STR => RTCSdpType::Offer,
            SDP_TYPE_PRANSWER_STR => RTCSdpType::Pranswer,
            SDP_TYPE_ANSWER_STR => RTCSdpType::Answer,
            SDP_TYPE_ROLLBACK_STR => RTCSdpType::Rollback,
            _ => RTCSdpType::Unspecified,
        }
    }
}

impl fmt::Display for RTCSdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCSdpType::Offer => SDP_TYPE_OFFER_STR,
            RTCSdpType::Pranswer => SDP_TYPE_PRANSWER_STR,
            RTCSdpType::Answer => SDP_TYPE_ANSWER_STR,
            RTCSdpType::Rollback => SDP_TYPE_ROLLBACK_STR,
            RTCSdpType::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl RTCSdpType {
    /// Whether a description of this type must carry a parsable body.
    pub(crate) fn has_body(self) -> bool {
        matches!(
            self,
            RTCSdpType::Offer | RTCSdpType::Pranswer | RTCSdpType::Answer
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sdp_type_string_round_trip() {
        let tests = vec![
            ("Unspecified", RTCSdpType::Unspecified),
            ("offer", RTCSdpType::Offer),
            ("pranswer", RTCSdpType::Pranswer),
            ("answer", RTCSdpType::Answer),
            ("rollback", RTCSdpType::Rollback),
        ];

        for (sdp_type_string, expected_sdp_type) in tests {
            assert_eq!(RTCSdpType::from(sdp_type_string), expected_sdp_type);
            assert_eq!(expected_sdp_type.to_string(), sdp_type_string);
        }
    }

    #[test]
    fn test_sdp_type_has_body() {
        let tests = vec![
            (RTCSdpType::Unspecified, false),
            (RTCSdpType::Offer, true),
            (RTCSdpType::Pranswer, true),
            (RTCSdpType::Answer, true),
            (RTCSdpType::Rollback, false),
        ];

        for (sdp_type, expected) in tests {
            assert_eq!(sdp_type.has_body(), expected, "{sdp_type}");
        }
    }
}
