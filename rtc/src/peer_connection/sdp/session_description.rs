use std::fmt::Display;

use sdp::description::session::SessionDescription;
use serde::{Deserialize, Serialize};

use super::sdp_type::RTCSdpType;
use super::{DefaultSdpCodec, SdpCodec};
use shared::error::Result;

/// A session description plus its role in the exchange.
///
/// Serializes as `{"type":"offer","sdp":"v=0..."}`. The parsed model is a
/// cache and never serialized.
///
/// ## Specifications
///
/// * [W3C](https://w3c.github.io/webrtc-pc/#rtcsessiondescription-class)
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,

    #[serde(skip)]
    pub(crate) parsed: Option<SessionDescription>,
}

impl PartialEq for RTCSessionDescription {
    fn eq(&self, other: &Self) -> bool {
        self.sdp_type == other.sdp_type && self.sdp == other.sdp
    }
}

impl Display for RTCSessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type: {}, sdp:\n{}",
            self.sdp_type,
            self.sdp.replace("\r\n", "\n")
        )
    }
}

impl RTCSessionDescription {
    fn parsed_as(sdp_type: RTCSdpType, sdp: String) -> Result<RTCSessionDescription> {
        let mut desc = RTCSessionDescription {
            sdp_type,
            sdp,
            parsed: None,
        };
        desc.parsed = Some(desc.unmarshal()?);
        Ok(desc)
    }

    /// Parses `sdp` as an answer.
    pub fn answer(sdp: String) -> Result<RTCSessionDescription> {
        RTCSessionDescription::parsed_as(RTCSdpType::Answer, sdp)
    }

    /// Parses `sdp` as an offer.
    pub fn offer(sdp: String) -> Result<RTCSessionDescription> {
        RTCSessionDescription::parsed_as(RTCSdpType::Offer, sdp)
    }

    /// Parses `sdp` as a provisional answer.
    pub fn pranswer(sdp: String) -> Result<RTCSessionDescription> {
        RTCSessionDescription::parsed_as(RTCSdpType::Pranswer, sdp)
    }

    /// A rollback request. It has no body.
    pub fn rollback() -> RTCSessionDescription {
        RTCSessionDescription::empty(RTCSdpType::Rollback)
    }

    /// A description without a body. Passed to `set_local_description`, the
    /// body is taken from the last created offer or answer.
    pub fn empty(sdp_type: RTCSdpType) -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type,
            sdp: String::new(),
            parsed: None,
        }
    }

    /// Parses the body with the default codec.
    pub fn unmarshal(&self) -> Result<SessionDescription> {
        DefaultSdpCodec.decode(&self.sdp)
    }

    pub(crate) fn parsed(&self) -> Option<&SessionDescription> {
        self.parsed.as_ref()
    }
}
